//! HTTP tool client: runs a tool by calling `GET {base_url}/{tool}`.
//!
//! Arguments are validated against the tool's spec before any I/O, then sent
//! as query parameters. Every failure comes back as a [`ToolResult::Failure`]
//! so the orchestrator can hand it to the model.

use async_trait::async_trait;
use std::time::Duration;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ToolArguments, ToolClient, ToolResult, ToolSpec, ValidatedArgs};
use tracing::{debug, warn};

pub struct HttpToolClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpToolClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Transport(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn dispatch(
        &self,
        spec: &ToolSpec,
        args: &ValidatedArgs,
    ) -> Result<serde_json::Value, ToolError> {
        let url = format!("{}/{}", self.base_url, spec.name());
        let query: Vec<(&str, String)> = args.iter().map(|(k, v)| (k, v.to_string())).collect();

        debug!(tool = %spec.name(), url = %url, "Dispatching tool call");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Transport(format!("request to {url} timed out"))
                } else {
                    ToolError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ToolError::ToolServer {
                status: status.as_u16(),
                body,
            });
        }

        // Keep non-JSON bodies as a plain string payload.
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    async fn invoke(&self, spec: &ToolSpec, arguments: &ToolArguments) -> ToolResult {
        let validated = match spec.validate(arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = %spec.name(), error = %e, "Rejected tool arguments");
                return ToolResult::failure(e);
            }
        };

        match self.dispatch(spec, &validated).await {
            Ok(payload) => ToolResult::success(payload),
            Err(e) => {
                warn!(tool = %spec.name(), kind = e.kind(), error = %e, "Tool call failed");
                ToolResult::failure(e)
            }
        }
    }
}
