//! Remote code-interpreter sessions used for every arithmetic step.
//!
//! One [`SandboxedCalculator`] belongs to one task. It walks the session through
//! `Uninitialized -> Active -> Stopped`; `run` never fails outward and `stop`
//! never surfaces teardown errors.

use std::sync::Arc;

use async_trait::async_trait;
use cloudcost_core::{
    CalculationResult, ProvisioningError, Session, SessionId, SessionState, TeardownError,
    ToolExecutionError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::llm::ToolDescriptor;
use crate::tools::{required_str, Tool};

pub mod http;

pub use http::HttpSandboxProvider;

pub const CALCULATOR_TOOL_NAME: &str = "execute_cost_calculation";
pub const SCRIPT_LANGUAGE: &str = "python";

/// Event stream returned by one `executeCode` invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStream {
    #[serde(default)]
    pub stream: Vec<ExecutionEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionOutput>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text".to_owned(), text: Some(text.into()) }
    }
}

impl ExecutionStream {
    /// Every text-typed content item, in stream order.
    pub fn collect_text(&self) -> CalculationResult {
        self.stream
            .iter()
            .filter_map(|event| event.result.as_ref())
            .flat_map(|output| output.content.iter())
            .filter(|item| item.kind == "text")
            .filter_map(|item| item.text.clone())
            .collect()
    }
}

#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn start_session(&self, region: &str) -> Result<SessionId, ProvisioningError>;

    async fn execute_code(
        &self,
        session: &SessionId,
        language: &str,
        code: &str,
    ) -> Result<ExecutionStream, ToolExecutionError>;

    async fn stop_session(&self, session: &SessionId) -> Result<(), TeardownError>;
}

pub struct SandboxedCalculator {
    provider: Arc<dyn SandboxProvider>,
    region: String,
    session: Mutex<Session>,
}

impl SandboxedCalculator {
    pub fn new(provider: Arc<dyn SandboxProvider>, region: impl Into<String>) -> Self {
        Self { provider, region: region.into(), session: Mutex::new(Session::default()) }
    }

    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Acquires the session. On failure the state stays uninitialized.
    pub async fn start(&self) -> Result<SessionId, ProvisioningError> {
        let mut session = self.session.lock().await;
        if !session.can_transition_to(SessionState::Active) {
            return Err(ProvisioningError::Rejected(format!(
                "calculator session is already {:?}",
                session.state()
            )));
        }

        info!(event_name = "sandbox.starting", region = %self.region, "starting code interpreter session");
        let id = self.provider.start_session(&self.region).await?;
        session
            .activate(id.clone())
            .map_err(|error| ProvisioningError::Rejected(error.to_string()))?;
        info!(event_name = "sandbox.started", session_id = %id, "code interpreter session started");

        Ok(id)
    }

    /// Executes `script` and returns its text output, or a diagnostic string.
    pub async fn run(&self, script: &str, description: &str) -> String {
        let active_id = {
            let session = self.session.lock().await;
            session.id().filter(|_| session.is_active()).cloned()
        };
        let Some(id) = active_id else {
            warn!(event_name = "sandbox.inactive", "calculation requested without an active session");
            return format!("❌ {}", ToolExecutionError::SessionInactive);
        };

        info!(event_name = "sandbox.executing", session_id = %id, description, "executing calculation");
        debug!(session_id = %id, script, "calculation script");

        match self.provider.execute_code(&id, SCRIPT_LANGUAGE, script).await {
            Ok(stream) => {
                let result = stream.collect_text();
                debug!(session_id = %id, output = %result.text(), "calculation output");
                if result.is_empty() {
                    "Calculation produced no text output.".to_owned()
                } else {
                    result.text()
                }
            }
            Err(error) => {
                warn!(event_name = "sandbox.execution_failed", session_id = %id, error = %error, "calculation failed");
                format!("❌ Calculation failed: {error}")
            }
        }
    }

    /// Releases the session if it is active. Teardown errors are logged only.
    pub async fn stop(&self) {
        let released = {
            let mut session = self.session.lock().await;
            if !session.is_active() {
                return;
            }
            session.stop()
        };

        let id = match released {
            Ok(id) => id,
            Err(error) => {
                warn!(event_name = "sandbox.stop_skipped", error = %error, "session could not be stopped");
                return;
            }
        };

        release(self.provider.as_ref(), &id).await;
    }
}

/// A calculator dropped mid-task (caller cancelled, panic unwinding) still
/// releases its session, on a spawned task.
impl Drop for SandboxedCalculator {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if !session.is_active() {
            return;
        }
        let Ok(id) = session.stop() else {
            return;
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                event_name = "sandbox.stop_abandoned",
                session_id = %id,
                "no async runtime left to release code interpreter session"
            );
            return;
        };

        warn!(event_name = "sandbox.stop_on_drop", session_id = %id, "releasing session of an abandoned task");
        let provider = Arc::clone(&self.provider);
        handle.spawn(async move {
            release(provider.as_ref(), &id).await;
        });
    }
}

async fn release(provider: &dyn SandboxProvider, id: &SessionId) {
    match provider.stop_session(id).await {
        Ok(()) => info!(event_name = "sandbox.stopped", session_id = %id, "code interpreter session stopped"),
        Err(error) => warn!(
            event_name = "sandbox.stop_failed",
            session_id = %id,
            error = %error,
            "error stopping code interpreter session"
        ),
    }
}

/// Exposes a task's calculator to the model.
pub struct CalculatorTool {
    calculator: Arc<SandboxedCalculator>,
}

impl CalculatorTool {
    pub fn new(calculator: Arc<SandboxedCalculator>) -> Self {
        Self { calculator }
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: CALCULATOR_TOOL_NAME.to_owned(),
            description: "Execute Python cost calculations in a secure sandbox. Pass retrieved prices \
                          in as variables and print every result."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "calculation_code": {
                        "type": "string",
                        "description": "Python code for the cost calculation"
                    },
                    "description": {
                        "type": "string",
                        "description": "What the calculation does"
                    }
                },
                "required": ["calculation_code"]
            }),
        }
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolExecutionError> {
        let code = required_str(&input, CALCULATOR_TOOL_NAME, "calculation_code")?;
        let description = input.get("description").and_then(Value::as_str).unwrap_or_default();
        Ok(self.calculator.run(code, description).await)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cloudcost_core::{ProvisioningError, SessionState, TeardownError, ToolExecutionError};
    use serde_json::json;

    use super::testing::{stream_of, ScriptedSandbox};
    use super::{CalculatorTool, ContentItem, ExecutionEvent, ExecutionOutput, ExecutionStream, SandboxedCalculator};
    use crate::tools::Tool;

    #[test]
    fn only_text_items_are_collected_in_order() {
        let stream = ExecutionStream {
            stream: vec![
                ExecutionEvent { result: None },
                ExecutionEvent {
                    result: Some(ExecutionOutput {
                        content: vec![
                            ContentItem::text("12"),
                            ContentItem { kind: "image".to_owned(), text: None },
                            ContentItem::text("0"),
                        ],
                    }),
                },
                ExecutionEvent { result: Some(ExecutionOutput { content: vec![ContentItem::text(".5")] }) },
            ],
        };

        assert_eq!(stream.collect_text().text(), "120.5");
    }

    #[test]
    fn provider_stream_json_deserializes() {
        let stream: ExecutionStream = serde_json::from_value(json!({
            "stream": [
                {"result": {"content": [{"type": "text", "text": "Total: 2.30"}]}},
                {"heartbeat": true}
            ]
        }))
        .expect("stream");

        assert_eq!(stream.collect_text().text(), "Total: 2.30");
    }

    #[tokio::test]
    async fn lifecycle_runs_start_run_stop_once() {
        let provider = Arc::new(ScriptedSandbox::with_outputs(vec![Ok(stream_of(&["12", "0", ".5"]))]));
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");

        calculator.start().await.expect("start");
        let output = calculator.run("print(120.5)", "sum").await;
        calculator.stop().await;
        calculator.stop().await;

        assert_eq!(output, "120.5");
        assert_eq!(provider.counts().await, (1, 1));
        assert_eq!(calculator.session().await.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn run_without_active_session_returns_diagnostic() {
        let provider = Arc::new(ScriptedSandbox::default());
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");

        let before_start = calculator.run("print(1)", "").await;
        calculator.start().await.expect("start");
        calculator.stop().await;
        let after_stop = calculator.run("print(1)", "").await;

        assert!(before_start.starts_with("❌"));
        assert!(after_stop.contains("not active"));
        assert!(provider.state.lock().await.scripts.is_empty());
    }

    #[tokio::test]
    async fn execution_failure_returns_diagnostic() {
        let provider = Arc::new(ScriptedSandbox::with_outputs(vec![Err(ToolExecutionError::Failed {
            tool: "executeCode".to_owned(),
            message: "SyntaxError: invalid syntax".to_owned(),
        })]));
        let calculator = SandboxedCalculator::new(provider, "us-east-1");
        calculator.start().await.expect("start");

        let output = calculator.run("print(", "broken").await;

        assert!(output.starts_with("❌ Calculation failed"));
        assert!(output.contains("SyntaxError"));
    }

    #[tokio::test]
    async fn failed_start_leaves_session_uninitialized() {
        let provider = Arc::new(ScriptedSandbox {
            start_error: Some(ProvisioningError::QuotaExhausted("10 sessions".to_owned())),
            ..ScriptedSandbox::default()
        });
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");

        let error = calculator.start().await.expect_err("quota");
        calculator.stop().await;

        assert!(matches!(error, ProvisioningError::QuotaExhausted(_)));
        assert_eq!(calculator.session().await.state(), SessionState::Uninitialized);
        assert_eq!(provider.counts().await, (1, 0));
    }

    #[tokio::test]
    async fn teardown_error_is_swallowed() {
        let provider = Arc::new(ScriptedSandbox {
            stop_error: Some(TeardownError("connection reset".to_owned())),
            ..ScriptedSandbox::default()
        });
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");
        calculator.start().await.expect("start");

        calculator.stop().await;

        assert_eq!(calculator.session().await.state(), SessionState::Stopped);
        assert_eq!(provider.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn dropping_an_active_calculator_releases_its_session() {
        let provider = Arc::new(ScriptedSandbox::default());
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");
        calculator.start().await.expect("start");

        drop(calculator);
        for _ in 0..10 {
            if provider.counts().await == (1, 1) {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(provider.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn dropping_a_stopped_calculator_does_not_release_twice() {
        let provider = Arc::new(ScriptedSandbox::default());
        let calculator = SandboxedCalculator::new(provider.clone(), "us-east-1");
        calculator.start().await.expect("start");
        calculator.stop().await;

        drop(calculator);
        tokio::task::yield_now().await;

        assert_eq!(provider.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn calculator_tool_requires_code() {
        let provider = Arc::new(ScriptedSandbox::default());
        let calculator = Arc::new(SandboxedCalculator::new(provider, "us-east-1"));
        let tool = CalculatorTool::new(calculator);

        let error = tool.invoke(json!({"description": "no code"})).await.expect_err("invalid");

        assert!(matches!(error, ToolExecutionError::InvalidInput { .. }));
        assert_eq!(tool.descriptor().name, "execute_cost_calculation");
    }
}
