//! HTTP client for the pipeline trigger endpoint

use std::time::Duration;
use tracing::info;

use crate::error::{Result, TriggerError};
use crate::trigger::{TriggerPayload, TriggerResult};

/// Sends trigger payloads. One POST per call, never retried.
#[derive(Debug, Clone)]
pub struct PipelineClient {
    http_client: reqwest::Client,
}

impl PipelineClient {
    /// Create a client; `timeout` of None leaves reqwest's default (no timeout)
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("pipeline_trigger/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
            TriggerError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { http_client })
    }

    /// POST the payload form-encoded to `endpoint_url`.
    /// Any HTTP status is returned as a TriggerResult; only network failures are errors.
    pub async fn submit(
        &self,
        payload: &TriggerPayload,
        endpoint_url: &str,
    ) -> Result<TriggerResult> {
        info!(
            "Triggering pipeline for '{}' on ref '{}'",
            payload.repo_name, payload.git_ref
        );

        let response = self
            .http_client
            .post(endpoint_url)
            .form(&payload.form_fields())
            .send()
            .await
            .map_err(TriggerError::Transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(TriggerError::Transport)?;

        let result = TriggerResult::from_response(status, body);
        if result.succeeded {
            info!(
                "Pipeline triggered for '{}': {}",
                payload.repo_name,
                result.pipeline_url.as_deref().unwrap_or("(no url)")
            );
        }
        Ok(result)
    }
}
