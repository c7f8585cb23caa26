use std::time::Duration;

use chrono::{DateTime, Utc};
use cloudcost_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::{build_runtime, init_logging, CommandResult};

pub const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";
pub const TRACE_HEADER: &str = "X-Amzn-Trace-Id";

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INVOKE_FAILED: u8 = 4;

const INVOKE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("runtime request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("runtime returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    prompt: &'a str,
}

/// Session ids are timestamped so repeated invocations land in fresh runtime sessions.
pub fn session_id(now: DateTime<Utc>) -> String {
    format!("runtime-with-identity-{}", now.format("%Y%m%dT%H%M%S%6fZ"))
}

pub struct RuntimeClient {
    client: reqwest::Client,
    url: String,
    bearer_token: SecretString,
}

impl RuntimeClient {
    pub fn new(url: impl Into<String>, bearer_token: SecretString) -> Result<Self, InvokeError> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(INVOKE_TIMEOUT_SECS)).build()?;
        Ok(Self { client, url: url.into(), bearer_token })
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String, InvokeError> {
        let session = session_id(Utc::now());
        info!(
            event_name = "cli.invoke.started",
            correlation_id = %session,
            url = %self.url,
            "invoking deployed runtime"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.bearer_token.expose_secret())
            .header(SESSION_HEADER, &session)
            .header(TRACE_HEADER, &session)
            .json(&InvokeBody { prompt })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InvokeError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }
}

pub fn run(description: &str, url: Option<String>, token: Option<String>) -> CommandResult {
    let description = description.trim();
    if description.is_empty() {
        return CommandResult::failure(
            "invoke",
            "invalid_input",
            "an architecture description is required",
            EXIT_CONFIG,
        );
    }

    let overrides =
        ConfigOverrides { runtime_url: url, runtime_bearer_token: token, ..ConfigOverrides::default() };
    let config = match AppConfig::resolve(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("invoke", "config_validation", error.to_string(), EXIT_CONFIG);
        }
    };
    init_logging(&config);

    let Some(url) = config.runtime.url.clone().filter(|url| !url.trim().is_empty()) else {
        return CommandResult::failure(
            "invoke",
            "config_validation",
            "runtime url is required (pass --url or set CLOUDCOST_RUNTIME_URL)",
            EXIT_CONFIG,
        );
    };
    let Some(token) = config
        .runtime
        .bearer_token
        .clone()
        .filter(|token| !token.expose_secret().trim().is_empty())
    else {
        return CommandResult::failure(
            "invoke",
            "config_validation",
            "bearer token is required (pass --token or set CLOUDCOST_RUNTIME_BEARER_TOKEN)",
            EXIT_CONFIG,
        );
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "invoke",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_INVOKE_FAILED,
            );
        }
    };

    let result = runtime.block_on(async {
        let client = RuntimeClient::new(url, token)?;
        client.invoke(description).await
    });

    match result {
        Ok(text) => CommandResult::text(0, text),
        Err(error) => CommandResult::failure("invoke", "runtime_invoke", error.to_string(), EXIT_INVOKE_FAILED),
    }
}
