//! JSON messages carried on the control and event exchanges.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const START_REQUEST_TYPE: &str = "scenario.start";
pub const LOG_EVENT_TYPE: &str = "log";
pub const DISPATCH_SOURCE: &str = "scenario-runner";
pub const UNKNOWN: &str = "unknown";

/// Current UTC time, RFC 3339 with microseconds.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn start_type() -> String {
    START_REQUEST_TYPE.to_string()
}

/// Control message asking the worker to play one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default = "unknown")]
    pub scenario: String,
    #[serde(default = "unknown")]
    pub run_id: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default = "start_type")]
    pub ty: String,
}

impl StartRequest {
    pub fn new(scenario: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            run_id: run_id.into(),
            ts: now_ts(),
            source: DISPATCH_SOURCE.to_string(),
            ty: start_type(),
        }
    }

    /// Stand-in for a control message whose body could not be decoded.
    pub fn sentinel() -> Self {
        Self {
            scenario: unknown(),
            run_id: unknown(),
            ts: now_ts(),
            source: String::new(),
            ty: start_type(),
        }
    }

    /// Decode a control message body. Never fails: anything that is not a
    /// JSON object becomes [`StartRequest::sentinel`], and absent fields fall
    /// back to `"unknown"`.
    pub fn parse_lenient(body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        match serde_json::from_str::<StartRequest>(&text) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, bytes = body.len(), "malformed start request");
                Self::sentinel()
            }
        }
    }
}

/// One line of incident output as seen by viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub ty: String,
    pub scenario: String,
    pub run_id: String,
    pub level: Severity,
    pub step: u32,
    pub message: String,
    pub ts: String,
}

impl LogEvent {
    pub fn new(
        scenario: &str,
        run_id: &str,
        level: Severity,
        step: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ty: LOG_EVENT_TYPE.to_string(),
            scenario: scenario.to_string(),
            run_id: run_id.to_string(),
            level,
            step,
            message: message.into(),
            ts: now_ts(),
        }
    }

    /// The single event emitted when the catalog has no such scenario.
    pub fn unknown_scenario(scenario: &str, run_id: &str) -> Self {
        Self::new(
            scenario,
            run_id,
            Severity::Error,
            0,
            format!("❌ Unknown scenario '{scenario}' (worker has no definition)"),
        )
    }
}
