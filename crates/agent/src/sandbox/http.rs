use std::time::Duration;

use async_trait::async_trait;
use cloudcost_core::config::SandboxConfig;
use cloudcost_core::{ProvisioningError, SessionId, TeardownError, ToolExecutionError};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{ExecutionStream, SandboxProvider};

/// JSON-over-HTTP client for a managed code-interpreter service.
pub struct HttpSandboxProvider {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpSandboxProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<SecretString>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint, api_key })
    }

    pub fn from_config(config: &SandboxConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("sandbox.endpoint is not configured"))?;
        Self::new(endpoint, config.api_key.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(api_key) => builder.bearer_auth(api_key.expose_secret()),
            None => builder,
        }
    }
}

#[derive(Deserialize)]
struct StartSessionResponse {
    session_id: String,
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    async fn start_session(&self, region: &str) -> Result<SessionId, ProvisioningError> {
        let response = self
            .authorized(self.client.post(format!("{}/sessions", self.endpoint)))
            .json(&json!({ "region": region }))
            .send()
            .await
            .map_err(|error| ProvisioningError::Unreachable(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisioningError::QuotaExhausted(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisioningError::Rejected(format!("HTTP {}: {body}", status.as_u16())));
        }

        let started: StartSessionResponse = response
            .json()
            .await
            .map_err(|error| ProvisioningError::Rejected(format!("unexpected start response: {error}")))?;
        Ok(SessionId(started.session_id))
    }

    async fn execute_code(
        &self,
        session: &SessionId,
        language: &str,
        code: &str,
    ) -> Result<ExecutionStream, ToolExecutionError> {
        let failed = |message: String| ToolExecutionError::Failed { tool: "executeCode".to_owned(), message };

        let response = self
            .authorized(self.client.post(format!("{}/sessions/{}/invoke", self.endpoint, session)))
            .json(&json!({
                "name": "executeCode",
                "arguments": { "language": language, "code": code },
            }))
            .send()
            .await
            .map_err(|error| failed(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {}: {body}", status.as_u16())));
        }

        response.json().await.map_err(|error| failed(format!("unexpected invoke response: {error}")))
    }

    async fn stop_session(&self, session: &SessionId) -> Result<(), TeardownError> {
        let response = self
            .authorized(self.client.delete(format!("{}/sessions/{}", self.endpoint, session)))
            .send()
            .await
            .map_err(|error| TeardownError(error.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(TeardownError(format!("HTTP {}", status.as_u16())))
        }
    }
}
