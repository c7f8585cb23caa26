use std::collections::BTreeMap;

use async_trait::async_trait;
use cloudcost_agent::llm::ToolDescriptor;
use cloudcost_agent::pricing::PricingCatalog;
use cloudcost_core::config::{CloudConfig, PricingConfig};
use cloudcost_core::ToolExecutionError;
use rmcp::model::{CallToolRequestParam, CallToolResult, JsonObject, Tool};
use rmcp::service::{Peer, RunningService, ServiceError};
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{McpError, McpResult};

/// Program, arguments and environment used to launch the pricing server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ServerCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The credential profile and region reach the server through its environment.
    pub fn from_config(pricing: &PricingConfig, cloud: &CloudConfig) -> Self {
        Self::new(pricing.command.clone(), pricing.args.iter().cloned())
            .with_env("AWS_PROFILE", cloud.profile.clone())
            .with_env("AWS_REGION", cloud.region.clone())
            .with_env("FASTMCP_LOG_LEVEL", "ERROR")
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env);
        command
    }
}

/// Pricing catalog served by a child MCP process, spawned on first use and
/// respawned on the next use after the connection breaks.
pub struct McpPricingCatalog {
    command: ServerCommand,
    connection: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl McpPricingCatalog {
    pub fn new(command: ServerCommand) -> Self {
        Self { command, connection: Mutex::new(None) }
    }

    pub fn command(&self) -> &ServerCommand {
        &self.command
    }

    async fn peer(&self) -> McpResult<Peer<RoleClient>> {
        let mut connection = self.connection.lock().await;
        if let Some(service) = connection.as_ref() {
            return Ok(service.peer().clone());
        }

        info!(event_name = "pricing.mcp.spawn", command = %self.command.display(), "starting pricing MCP server");
        let transport = TokioChildProcess::new(self.command.to_command())
            .map_err(|source| McpError::Spawn { command: self.command.display(), source })?;
        let service =
            ().serve(transport).await.map_err(|error| McpError::Handshake(error.to_string()))?;
        let peer = service.peer().clone();
        *connection = Some(service);

        Ok(peer)
    }

    /// Drops the cached connection when a request failed below the protocol
    /// layer, so the next request starts a fresh server. Errors reported by the
    /// server itself leave the connection in place.
    async fn discard_broken(&self, error: &ServiceError) {
        if matches!(error, ServiceError::McpError(_)) {
            return;
        }
        let Some(service) = self.connection.lock().await.take() else {
            return;
        };

        warn!(
            event_name = "pricing.mcp.connection_lost",
            command = %self.command.display(),
            error = %error,
            "pricing MCP server connection lost; respawning on next use"
        );
        if let Err(error) = service.cancel().await {
            warn!(event_name = "pricing.mcp.shutdown_failed", error = %error, "pricing MCP server did not stop cleanly");
        }
    }

    /// Stops the child process if one is running.
    pub async fn shutdown(&self) {
        let Some(service) = self.connection.lock().await.take() else {
            return;
        };
        if let Err(error) = service.cancel().await {
            warn!(event_name = "pricing.mcp.shutdown_failed", error = %error, "pricing MCP server did not stop cleanly");
        }
    }
}

#[async_trait]
impl PricingCatalog for McpPricingCatalog {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolExecutionError> {
        let peer = self.peer().await.map_err(|error| error.into_tool_error("list_tools"))?;
        let tools = match peer.list_all_tools().await {
            Ok(tools) => tools,
            Err(error) => {
                self.discard_broken(&error).await;
                return Err(McpError::Request(error.to_string()).into_tool_error("list_tools"));
            }
        };

        Ok(tools.iter().map(descriptor_from_tool).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolExecutionError> {
        let arguments = into_arguments(name, arguments)?;
        let peer = self.peer().await.map_err(|error| error.into_tool_error(name))?;
        let result =
            match peer.call_tool(CallToolRequestParam { name: name.to_owned().into(), arguments }).await {
                Ok(result) => result,
                Err(error) => {
                    self.discard_broken(&error).await;
                    return Err(McpError::Request(error.to_string()).into_tool_error(name));
                }
            };

        flatten_result(name, &result)
    }
}

fn descriptor_from_tool(tool: &Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_owned(),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

fn into_arguments(tool: &str, arguments: Value) -> Result<Option<JsonObject>, ToolExecutionError> {
    match arguments {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(ToolExecutionError::InvalidInput {
            tool: tool.to_owned(),
            message: format!("arguments must be a JSON object, got `{other}`"),
        }),
    }
}

/// Joins the text content of a tool result; error results become tool failures.
fn flatten_result(tool: &str, result: &CallToolResult) -> Result<String, ToolExecutionError> {
    let text = result
        .content
        .iter()
        .filter_map(|content| content.raw.as_text().map(|text| text.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(ToolExecutionError::Failed { tool: tool.to_owned(), message: text });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cloudcost_core::config::{CloudConfig, PricingConfig};
    use cloudcost_core::ToolExecutionError;
    use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
    use serde_json::json;

    use super::{descriptor_from_tool, flatten_result, into_arguments, ServerCommand};

    #[test]
    fn command_carries_profile_and_region() {
        let command = ServerCommand::from_config(
            &PricingConfig {
                command: "uvx".to_owned(),
                args: vec!["awslabs.aws-pricing-mcp-server@latest".to_owned()],
            },
            &CloudConfig { region: "eu-west-1".to_owned(), profile: "estimator".to_owned() },
        );

        assert_eq!(command.display(), "uvx awslabs.aws-pricing-mcp-server@latest");
        assert_eq!(command.env.get("AWS_REGION").map(String::as_str), Some("eu-west-1"));
        assert_eq!(command.env.get("AWS_PROFILE").map(String::as_str), Some("estimator"));
    }

    #[test]
    fn discovered_tool_keeps_provider_schema() {
        let schema = match json!({
            "type": "object",
            "properties": {"service_code": {"type": "string"}}
        }) {
            serde_json::Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        let tool = Tool::new("get_pricing", "Get pricing information", Arc::new(schema));

        let descriptor = descriptor_from_tool(&tool);

        assert_eq!(descriptor.name, "get_pricing");
        assert_eq!(descriptor.description, "Get pricing information");
        assert_eq!(descriptor.input_schema["properties"]["service_code"]["type"], "string");
    }

    #[test]
    fn text_content_is_joined_and_errors_surface() {
        let ok = CallToolResult::success(vec![
            Content::text("AmazonS3 us-east-1"),
            Content::text("0.023 USD per GB-Mo"),
        ]);
        let failed = CallToolResult::error(vec![Content::text("service code not found")]);

        assert_eq!(
            flatten_result("get_pricing", &ok).expect("text"),
            "AmazonS3 us-east-1\n0.023 USD per GB-Mo"
        );
        assert!(matches!(
            flatten_result("get_pricing", &failed),
            Err(ToolExecutionError::Failed { message, .. }) if message == "service code not found"
        ));
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        assert!(into_arguments("get_pricing", json!(null)).expect("null").is_none());
        assert!(matches!(
            into_arguments("get_pricing", json!(["AmazonS3"])),
            Err(ToolExecutionError::InvalidInput { .. })
        ));
    }
}
