//! Built-in incident scenarios.
//!
//! The table is built once and never mutated; lookups need no locking.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::protocol::Severity;

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioStep {
    pub level: Severity,
    pub message: String,
    pub duration: Duration,
}

impl ScenarioStep {
    pub fn new(level: Severity, message: impl Into<String>, seconds: f64) -> Self {
        Self {
            level,
            message: message.into(),
            duration: Duration::from_secs_f64(seconds),
        }
    }
}

/// Ordered, non-empty list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    steps: Vec<ScenarioStep>,
}

impl ScenarioDefinition {
    /// `None` for an empty step list or a non-positive duration.
    pub fn new(steps: Vec<ScenarioStep>) -> Option<Self> {
        if steps.is_empty() || steps.iter().any(|s| s.duration.is_zero()) {
            return None;
        }
        Some(Self { steps })
    }

    pub fn steps(&self) -> &[ScenarioStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of the configured step delays.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, ScenarioDefinition>,
}

impl ScenarioCatalog {
    pub fn from_definitions<I, K>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (K, ScenarioDefinition)>,
        K: Into<String>,
    {
        Self {
            scenarios: definitions
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// The eight shipped scenarios.
    pub fn builtin() -> &'static ScenarioCatalog {
        &BUILTIN
    }

    pub fn get(&self, scenario: &str) -> Option<&ScenarioDefinition> {
        self.scenarios.get(scenario)
    }

    /// Scenario identifiers in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScenarioDefinition)> {
        self.scenarios.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

lazy_static::lazy_static! {
    static ref BUILTIN: ScenarioCatalog = build_builtin();
}

type RawStep = (Severity, &'static str, f64);

fn define(steps: &[RawStep]) -> ScenarioDefinition {
    let steps = steps
        .iter()
        .map(|&(level, message, seconds)| ScenarioStep::new(level, message, seconds))
        .collect();
    // Static data below is non-empty with positive durations.
    ScenarioDefinition { steps }
}

fn build_builtin() -> ScenarioCatalog {
    use Severity::{Info, Success, Warn};

    ScenarioCatalog::from_definitions([
        (
            "db_latency",
            define(&[
                (Info, "🚀 Starting scenario: DB Latency", 0.8),
                (Info, "🔎 Checking DB connectivity", 0.8),
                (Info, "🧪 Injecting artificial latency (p95 target: 1200ms)", 1.0),
                (Warn, "📈 Latency rising... p95 breached threshold", 1.0),
                (Warn, "🚨 Alert fired: db_latency_p95_high", 0.8),
                (Info, "📘 Runbook: switching app to safe mode + draining queue", 1.2),
                (Info, "🛠 Mitigation: reducing pool size + retry backoff", 1.0),
                (Success, "✅ Latency normalized (p95 back under threshold)", 1.0),
                (Success, "🏁 Scenario completed: DB Latency", 0.6),
            ]),
        ),
        (
            "crash_loop",
            define(&[
                (Info, "🚀 Starting scenario: Crash Loop", 0.8),
                (Info, "🔎 Detecting unstable container restarts", 1.0),
                (Warn, "💥 Pod enters CrashLoopBackOff (simulated)", 1.0),
                (Warn, "🚨 Alert fired: pod_crashloop_rate_high", 0.8),
                (Info, "📘 Runbook: inspect last logs + config + env", 1.0),
                (Info, "🛠 Mitigation: roll back to last stable version", 1.2),
                (Success, "✅ Restarts stopped (stable)", 1.0),
                (Success, "🏁 Scenario completed: Crash Loop", 0.6),
            ]),
        ),
        (
            "memory_leak",
            define(&[
                (Info, "🚀 Starting scenario: Memory Leak", 0.8),
                (Info, "🔎 Monitoring RSS growth + GC pressure", 1.0),
                (Warn, "📈 Memory steadily increasing (simulated)", 1.0),
                (Warn, "🚨 Alert fired: memory_usage_high", 0.8),
                (Info, "📘 Runbook: capture heap dump + top allocators", 1.1),
                (Info, "🛠 Mitigation: restart pod + enable leak guardrails", 1.1),
                (Success, "✅ Memory stabilized after restart", 0.9),
                (Success, "🏁 Scenario completed: Memory Leak", 0.6),
            ]),
        ),
        (
            "cpu_spike",
            define(&[
                (Info, "🚀 Starting scenario: CPU Spike", 0.8),
                (Info, "🔎 Inspecting CPU saturation + throttling", 1.0),
                (Warn, "🔥 CPU usage spikes above 90% (simulated)", 1.0),
                (Warn, "🚨 Alert fired: cpu_high", 0.8),
                (Info, "📘 Runbook: check hot endpoints + profiling", 1.1),
                (Info, "🛠 Mitigation: scale out + apply rate limit", 1.1),
                (Success, "✅ CPU returned to baseline", 0.9),
                (Success, "🏁 Scenario completed: CPU Spike", 0.6),
            ]),
        ),
        (
            "disk_full",
            define(&[
                (Info, "🚀 Starting scenario: Disk Full", 0.8),
                (Info, "🔎 Checking node filesystem usage", 1.0),
                (Warn, "💽 Disk usage reaches 95% (simulated)", 1.0),
                (Warn, "🚨 Alert fired: disk_space_low", 0.8),
                (Info, "📘 Runbook: find largest dirs + log growth", 1.1),
                (Info, "🛠 Mitigation: rotate logs + increase volume", 1.1),
                (Success, "✅ Free space restored", 0.9),
                (Success, "🏁 Scenario completed: Disk Full", 0.6),
            ]),
        ),
        (
            "network_loss",
            define(&[
                (Info, "🚀 Starting scenario: Network Loss", 0.8),
                (Info, "🔎 Checking service connectivity + DNS", 1.0),
                (Warn, "📡 Intermittent packet loss (simulated)", 1.0),
                (Warn, "🚨 Alert fired: upstream_unreachable", 0.8),
                (Info, "📘 Runbook: trace route + check network policies", 1.1),
                (Info, "🛠 Mitigation: rollback policy + restart sidecar", 1.1),
                (Success, "✅ Connectivity restored", 0.9),
                (Success, "🏁 Scenario completed: Network Loss", 0.6),
            ]),
        ),
        (
            "bad_deploy",
            define(&[
                (Info, "🚀 Starting scenario: Bad Deploy", 0.8),
                (Info, "🔎 Detecting error-rate regression", 1.0),
                (Warn, "📦 New version increases 5xx errors (simulated)", 1.0),
                (Warn, "🚨 Alert fired: error_rate_high", 0.8),
                (Info, "📘 Runbook: compare diff + check config/env changes", 1.1),
                (Info, "🛠 Mitigation: rollback deployment + freeze promotions", 1.1),
                (Success, "✅ Error rate back to normal after rollback", 0.9),
                (Success, "🏁 Scenario completed: Bad Deploy", 0.6),
            ]),
        ),
        (
            "secrets_expired",
            define(&[
                (Info, "🚀 Starting scenario: Secrets Expired", 0.8),
                (Info, "🔎 Checking token/cert validity windows", 1.0),
                (Warn, "🔐 Secret expired causes auth failures (simulated)", 1.0),
                (Warn, "🚨 Alert fired: auth_failures_high", 0.8),
                (Info, "📘 Runbook: rotate secret + restart dependent pods", 1.1),
                (Info, "🛠 Mitigation: renew cert + update secret store", 1.1),
                (Success, "✅ Authentication restored", 0.9),
                (Success, "🏁 Scenario completed: Secrets Expired", 0.6),
            ]),
        ),
    ])
}
