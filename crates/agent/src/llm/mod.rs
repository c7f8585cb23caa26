//! Reasoning-model seam. Providers translate this neutral message shape into
//! their own wire format and back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudcost_core::config::{ModelConfig, ModelProvider};
use cloudcost_core::{ModelInvocationError, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiCompatibleClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::Text { text: text.into() }] }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content: results }
    }
}

/// Name, description and JSON schema of a tool offered to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// One assistant message returned by the provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelTurn {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ContentBlock::Text { text: text.into() }], stop_reason: StopReason::EndTurn }
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall { id: id.clone(), name: name.clone(), input: input.clone() })
                }
                _ => None,
            })
            .collect()
    }

    /// Text blocks joined in order; empty when the turn carried none.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &'static str;
    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, ModelInvocationError>;
}

pub fn client_from_config(config: &ModelConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let client: Arc<dyn LlmClient> = match config.provider {
        ModelProvider::Anthropic => Arc::new(AnthropicClient::new(config, timeout)?),
        ModelProvider::OpenAi | ModelProvider::Ollama => {
            Arc::new(OpenAiCompatibleClient::new(config, timeout)?)
        }
    };
    Ok(client)
}

pub(crate) fn map_transport_error(error: reqwest::Error) -> ModelInvocationError {
    if error.is_decode() {
        ModelInvocationError::Malformed(error.to_string())
    } else {
        ModelInvocationError::Unreachable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ContentBlock, ModelTurn, StopReason};

    #[test]
    fn turn_exposes_tool_calls_and_joined_text_in_order() {
        let turn = ModelTurn {
            content: vec![
                ContentBlock::Text { text: "Looking up ".to_owned() },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_owned(),
                    name: "get_pricing".to_owned(),
                    input: json!({"service_code": "AmazonS3"}),
                },
                ContentBlock::Text { text: "S3 prices".to_owned() },
            ],
            stop_reason: StopReason::ToolUse,
        };

        assert_eq!(turn.joined_text(), "Looking up S3 prices");
        let calls = turn.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_pricing");
        assert_eq!(calls[0].input["service_code"], "AmazonS3");
    }

    #[test]
    fn tool_only_turn_has_no_text() {
        let turn = ModelTurn {
            content: vec![ContentBlock::ToolUse {
                id: "toolu_2".to_owned(),
                name: "execute_cost_calculation".to_owned(),
                input: json!({}),
            }],
            stop_reason: StopReason::ToolUse,
        };

        assert!(turn.joined_text().is_empty());
    }
}
