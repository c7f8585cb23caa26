use std::time::Duration;

use async_trait::async_trait;
use cloudcost_core::config::ModelConfig;
use cloudcost_core::ModelInvocationError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    map_transport_error, ContentBlock, LlmClient, Message, ModelRequest, ModelTurn, Role,
    StopReason,
};

/// `/chat/completions` client for OpenAI and OpenAI-compatible servers (Ollama).
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: &'static str,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &ModelConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_owned());

        Ok(Self {
            client,
            provider: config.provider.as_str(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider_name(&self) -> &'static str {
        self.provider
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, ModelInvocationError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: to_wire_messages(&request.system, &request.messages),
            tools: request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect(),
        };

        debug!(
            event_name = "model.request",
            provider = self.provider,
            model = %self.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let mut builder = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelInvocationError::Api { status: status.as_u16(), message });
        }

        let parsed: ChatResponse = response.json().await.map_err(map_transport_error)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelInvocationError::Malformed("response had no choices".to_owned()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
            content.push(ContentBlock::Text { text });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = parse_arguments(&call.function.name, &call.function.arguments);
            content.push(ContentBlock::ToolUse { id: call.id, name: call.function.name, input });
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("stop") => StopReason::EndTurn,
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::Other,
        };

        Ok(ModelTurn { content, stop_reason })
    }
}

/// Unparseable arguments are kept as a raw string so the registry can answer the
/// call with an invalid-input result instead of failing the turn.
fn parse_arguments(tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|error| {
        warn!(event_name = "model.tool_arguments_invalid", tool, error = %error, "tool call arguments are not JSON");
        Value::String(raw.to_owned())
    })
}

fn to_wire_messages(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut wire = vec![json!({"role": "system", "content": system})];

    for message in messages {
        match message.role {
            Role::User => {
                let mut text = String::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text: fragment } => text.push_str(fragment),
                        ContentBlock::ToolResult { tool_use_id, content } => wire.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content,
                        })),
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                if !text.is_empty() {
                    wire.push(json!({"role": "user", "content": text}));
                }
            }
            Role::Assistant => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text: fragment } => text.push_str(fragment),
                        ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": input.to_string()},
                        })),
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                let mut entry = json!({"role": "assistant", "content": text});
                if !tool_calls.is_empty() {
                    entry["tool_calls"] = Value::Array(tool_calls);
                }
                wire.push(entry);
            }
        }
    }

    wire
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
