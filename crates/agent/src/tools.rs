use std::sync::Arc;

use async_trait::async_trait;
use cloudcost_core::{ToolCall, ToolExecutionError};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::ToolDescriptor;

/// A callable the model may name in a tool call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn invoke(&self, input: Value) -> Result<String, ToolExecutionError>;
}

/// Tools offered to the model for one task, dispatched by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<(ToolDescriptor, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    /// Registers a tool. A later registration with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let descriptor = tool.descriptor();
        self.tools.retain(|(existing, _)| existing.name != descriptor.name);
        self.tools.push((descriptor, tool));
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|(descriptor, _)| descriptor.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|(descriptor, _)| descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the named tool. Failures come back as text for the model, never as errors.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some((_, tool)) = self.tools.iter().find(|(descriptor, _)| descriptor.name == call.name)
        else {
            warn!(event_name = "tool.unknown", tool = %call.name, "model requested an unregistered tool");
            return tool_error_text(&ToolExecutionError::UnknownTool(call.name.clone()));
        };

        if !call.input.is_object() {
            let error = ToolExecutionError::InvalidInput {
                tool: call.name.clone(),
                message: format!("arguments must be a JSON object, got `{}`", call.input),
            };
            warn!(event_name = "tool.invalid_arguments", tool = %call.name, call_id = %call.id, "tool call arguments rejected");
            return tool_error_text(&error);
        }

        match tool.invoke(call.input.clone()).await {
            Ok(output) => {
                info!(event_name = "tool.completed", tool = %call.name, call_id = %call.id, "tool call completed");
                output
            }
            Err(error) => {
                warn!(
                    event_name = "tool.failed",
                    tool = %call.name,
                    call_id = %call.id,
                    error = %error,
                    "tool call failed"
                );
                tool_error_text(&error)
            }
        }
    }
}

pub fn tool_error_text(error: &ToolExecutionError) -> String {
    format!("❌ {error}")
}

/// Reads a required string field from a tool's JSON input.
pub(crate) fn required_str<'a>(
    input: &'a Value,
    tool: &str,
    field: &str,
) -> Result<&'a str, ToolExecutionError> {
    input.get(field).and_then(Value::as_str).ok_or_else(|| ToolExecutionError::InvalidInput {
        tool: tool.to_owned(),
        message: format!("`{field}` must be a string"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use cloudcost_core::{ToolCall, ToolExecutionError};
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{required_str, Tool, ToolRegistry};
    use crate::llm::ToolDescriptor;

    struct EchoTool {
        name: &'static str,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.name.to_owned(),
                description: "echoes `text`".to_owned(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, input: Value) -> Result<String, ToolExecutionError> {
            *self.calls.lock().await += 1;
            required_str(&input, self.name, "text").map(str::to_owned)
        }
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall { id: "call_1".to_owned(), name: name.to_owned(), input }
    }

    #[tokio::test]
    async fn dispatch_routes_by_name() {
        let mut registry = ToolRegistry::default();
        let echo = Arc::new(EchoTool { name: "echo", calls: Mutex::new(0) });
        registry.register(echo.clone());

        let output = registry.dispatch(&call("echo", json!({"text": "hello"}))).await;

        assert_eq!(output, "hello");
        assert_eq!(*echo.calls.lock().await, 1);
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_input_degrade_to_text() {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(EchoTool { name: "echo", calls: Mutex::new(0) }));

        let unknown = registry.dispatch(&call("missing", json!({}))).await;
        let invalid = registry.dispatch(&call("echo", json!({"text": 7}))).await;

        assert!(unknown.starts_with("❌"));
        assert!(unknown.contains("unknown tool `missing`"));
        assert!(invalid.contains("`text` must be a string"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_answered_without_invoking() {
        let mut registry = ToolRegistry::default();
        let echo = Arc::new(EchoTool { name: "echo", calls: Mutex::new(0) });
        registry.register(echo.clone());

        let output = registry.dispatch(&call("echo", json!("{text: hello"))).await;

        assert!(output.starts_with("❌ invalid input for tool `echo`"));
        assert!(output.contains("arguments must be a JSON object"));
        assert_eq!(*echo.calls.lock().await, 0);
    }

    #[test]
    fn reregistering_a_name_replaces_the_tool() {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(EchoTool { name: "echo", calls: Mutex::new(0) }));
        registry.register(Arc::new(EchoTool { name: "echo", calls: Mutex::new(0) }));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
    }
}
