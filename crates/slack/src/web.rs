use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::Block;
use crate::events::OutboundMessage;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebApiError {
    #[error("slack web api unreachable: {0}")]
    Transport(String),
    #[error("slack web api returned HTTP {0}")]
    Status(u16),
    #[error("slack web api `{method}` failed: {error}")]
    Api { method: &'static str, error: String },
}

/// Delivers handler replies back to Slack.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post(&self, message: &OutboundMessage) -> Result<(), WebApiError>;
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    text: &'a str,
    blocks: &'a [Block],
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Minimal Slack Web API client: `chat.postMessage` with the bot token and
/// `apps.connections.open` with the app-level token.
pub struct SlackWebClient {
    client: Client,
    api_base: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> anyhow::Result<Self> {
        Self::with_api_base(SLACK_API_BASE, bot_token)
    }

    pub fn with_api_base(api_base: impl Into<String>, bot_token: SecretString) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, api_base: api_base.into().trim_end_matches('/').to_owned(), bot_token })
    }

    /// Returns the single-use WebSocket URL for a Socket Mode connection.
    pub async fn open_connection(&self, app_token: &SecretString) -> Result<String, WebApiError> {
        let response = self
            .call("apps.connections.open", app_token, self.client.post(self.method_url("apps.connections.open")))
            .await?;

        response.url.ok_or_else(|| WebApiError::Api {
            method: "apps.connections.open",
            error: "response carried no url".to_owned(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call(
        &self,
        method: &'static str,
        token: &SecretString,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse, WebApiError> {
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| WebApiError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Status(status.as_u16()));
        }

        let body: ApiResponse =
            response.json().await.map_err(|error| WebApiError::Transport(error.to_string()))?;
        if !body.ok {
            return Err(WebApiError::Api {
                method,
                error: body.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post(&self, message: &OutboundMessage) -> Result<(), WebApiError> {
        let request = PostMessageRequest {
            channel: &message.channel_id,
            thread_ts: message.thread_ts.as_deref(),
            text: &message.template.fallback_text,
            blocks: &message.template.blocks,
        };
        let builder = self.client.post(self.method_url("chat.postMessage")).json(&request);

        self.call("chat.postMessage", &self.bot_token, builder).await.map(|_| ())
    }
}
