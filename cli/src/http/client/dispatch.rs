use std::time::Duration;

use incidentops_core::api::{CliError, StartAck};
use reqwest::{Client, Url};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
    #[serde(default)]
    error_code: Option<String>,
}

/// Talks to a running dispatch service.
#[derive(Clone)]
pub struct DispatchClient {
    client: Client,
    base_url: Url,
}

impl DispatchClient {
    pub fn new(base_url: &str) -> Result<Self, CliError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CliError::Command(format!("http client: {e}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| CliError::Command(format!("invalid dispatch url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CliError::Command(format!(
                "invalid dispatch url '{base_url}': not a base url"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// The scenario is a single percent-encoded path segment.
    pub fn start_url(&self, scenario: &str) -> Url {
        self.endpoint(&["api", "scenarios", scenario, "start"])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn start(&self, scenario: &str) -> Result<StartAck, CliError> {
        let url = self.start_url(scenario);
        tracing::debug!("Sending start request to {}", url);

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| CliError::Command(format!("Failed to send request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => match body.error_code {
                    Some(code) => format!("{} ({code})", body.detail),
                    None => body.detail,
                },
                Err(_) => text,
            };
            return Err(CliError::Command(format!(
                "Request failed with status {status}: {detail}"
            )));
        }

        response
            .json::<StartAck>()
            .await
            .map_err(|e| CliError::Command(format!("Invalid response body: {e}")))
    }

    pub async fn health_check(&self) -> Result<bool, CliError> {
        let url = self.endpoint(&["health"]);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CliError::Command(format!("Health check failed: {e}")))?;
        Ok(response.status().is_success())
    }
}
