use std::sync::Arc;

use async_trait::async_trait;
use cloudcost_core::config::AppConfig;
use cloudcost_core::prompts::{render_estimation_prompt, SYSTEM_PROMPT};
use cloudcost_core::{ModelInvocationError, Response, Task, TaskError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::llm::{self, ContentBlock, LlmClient, Message, ModelRequest, StopReason};
use crate::pricing::{discover_pricing_tools, PricingCatalog};
use crate::sandbox::{CalculatorTool, HttpSandboxProvider, SandboxProvider, SandboxedCalculator};
use crate::stream::{DeltaSink, EstimateEvent};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 25;

/// What delivery adapters call. Implementations never fail; faults come back
/// as diagnostic responses.
#[async_trait]
pub trait EstimationService: Send + Sync {
    async fn estimate(&self, task: &Task) -> Response;

    /// Same contract as `estimate`, with output also pushed to `events` as it
    /// is produced. The default sends the finished response as one event.
    async fn estimate_streaming(&self, task: &Task, events: mpsc::Sender<EstimateEvent>) -> Response {
        let response = self.estimate(task).await;
        let event = if response.is_failure() {
            EstimateEvent::Error(response.text.clone())
        } else {
            EstimateEvent::Data(response.text.clone())
        };
        let _ = events.send(event).await;
        response
    }
}

/// Runs one cost-estimation task end to end: session setup, tool discovery,
/// the model tool loop and session release.
pub struct CostEstimatorAgent {
    model: Arc<dyn LlmClient>,
    sandbox: Arc<dyn SandboxProvider>,
    pricing: Arc<dyn PricingCatalog>,
    region: String,
    max_tool_rounds: u32,
}

impl CostEstimatorAgent {
    pub fn new(
        model: Arc<dyn LlmClient>,
        sandbox: Arc<dyn SandboxProvider>,
        pricing: Arc<dyn PricingCatalog>,
    ) -> Self {
        Self {
            model,
            sandbox,
            pricing,
            region: cloudcost_core::config::DEFAULT_REGION.to_owned(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Wires the configured model client and HTTP sandbox around `pricing`.
    pub fn from_config(config: &AppConfig, pricing: Arc<dyn PricingCatalog>) -> anyhow::Result<Self> {
        let model = llm::client_from_config(&config.model)?;
        let sandbox = Arc::new(HttpSandboxProvider::from_config(&config.sandbox)?);

        Ok(Self::new(model, sandbox, pricing)
            .with_region(config.cloud.region.clone())
            .with_max_tool_rounds(config.model.max_tool_rounds))
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Never fails: every fault becomes a diagnostic response.
    pub async fn estimate(&self, task: &Task) -> Response {
        self.execute(task, None).await
    }

    /// Streams the text of every model turn as deltas, then a closing event for
    /// empty or failed runs.
    pub async fn estimate_streaming(
        &self,
        task: &Task,
        events: mpsc::Sender<EstimateEvent>,
    ) -> Response {
        let mut sink = DeltaSink::new(events);
        let response = self.execute(task, Some(&mut sink)).await;
        sink.finish(&response).await;
        response
    }

    async fn execute(&self, task: &Task, sink: Option<&mut DeltaSink>) -> Response {
        info!(
            event_name = "estimate.started",
            task_id = %task.id(),
            requester = task.requester().unwrap_or("anonymous"),
            "starting cost estimation"
        );

        let calculator = Arc::new(SandboxedCalculator::new(Arc::clone(&self.sandbox), &self.region));
        if let Err(provisioning) = calculator.start().await {
            let task_error = TaskError::from(provisioning);
            error!(event_name = "estimate.failed", task_id = %task.id(), error = %task_error, "sandbox provisioning failed");
            return Response::failed(task_error);
        }

        let outcome = self.run_tool_loop(task, Arc::clone(&calculator), sink).await;
        calculator.stop().await;

        match outcome {
            Ok(response) => {
                info!(
                    event_name = "estimate.completed",
                    task_id = %task.id(),
                    outcome = ?response.outcome,
                    "cost estimation completed"
                );
                response
            }
            Err(task_error) => {
                error!(event_name = "estimate.failed", task_id = %task.id(), error = %task_error, "cost estimation failed");
                Response::failed(task_error)
            }
        }
    }

    async fn run_tool_loop(
        &self,
        task: &Task,
        calculator: Arc<SandboxedCalculator>,
        mut sink: Option<&mut DeltaSink>,
    ) -> Result<Response, TaskError> {
        let mut registry = ToolRegistry::default();
        for tool in discover_pricing_tools(Arc::clone(&self.pricing)).await.map_err(TaskError::Discovery)? {
            registry.register(Arc::new(tool));
        }
        registry.register(Arc::new(CalculatorTool::new(calculator)));

        let prompt = render_estimation_prompt(task.description())
            .map_err(|error| TaskError::Prompt(error.to_string()))?;
        let mut messages = vec![Message::user_text(prompt)];
        let tools = registry.descriptors();
        let mut rounds = 0u32;

        loop {
            let request = ModelRequest {
                system: SYSTEM_PROMPT.to_owned(),
                messages: messages.clone(),
                tools: tools.clone(),
            };
            let turn = self.model.complete(&request).await?;
            if let Some(sink) = sink.as_mut() {
                sink.turn_text(&turn.joined_text()).await;
            }
            let calls = turn.tool_calls();

            if calls.is_empty() {
                if turn.stop_reason == StopReason::MaxTokens {
                    warn!(
                        event_name = "estimate.truncated",
                        task_id = %task.id(),
                        "final answer hit the model token limit and may be cut off"
                    );
                }
                return Ok(Response::answered(turn.joined_text()));
            }

            rounds += 1;
            if rounds > self.max_tool_rounds {
                warn!(event_name = "estimate.step_limit", task_id = %task.id(), rounds, "tool round limit reached");
                return Err(ModelInvocationError::StepLimit(self.max_tool_rounds).into());
            }

            messages.push(Message::assistant(turn.content));
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                info!(event_name = "tool.dispatch", task_id = %task.id(), tool = %call.name, round = rounds, "dispatching tool call");
                let content = registry.dispatch(call).await;
                results.push(ContentBlock::ToolResult { tool_use_id: call.id.clone(), content });
            }
            messages.push(Message::tool_results(results));
        }
    }
}

#[async_trait]
impl EstimationService for CostEstimatorAgent {
    async fn estimate(&self, task: &Task) -> Response {
        CostEstimatorAgent::estimate(self, task).await
    }

    async fn estimate_streaming(&self, task: &Task, events: mpsc::Sender<EstimateEvent>) -> Response {
        CostEstimatorAgent::estimate_streaming(self, task, events).await
    }
}
