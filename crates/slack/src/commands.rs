use std::sync::Arc;

use cloudcost_agent::EstimationService;
use cloudcost_core::{ResponseOutcome, Task};
use thiserror::Error;
use tracing::info;

use crate::blocks::{self, MessageTemplate};

pub const ESTIMATE_COMMAND: &str = "/estimate";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EstimateCommand {
    Estimate { description: String },
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

/// Blank text and a bare `help` both ask for usage.
pub fn parse_estimate_command(payload: &SlashCommandPayload) -> Result<EstimateCommand, CommandParseError> {
    if payload.command != ESTIMATE_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }

    let description = payload.text.trim();
    if description.is_empty() || description.eq_ignore_ascii_case("help") {
        return Ok(EstimateCommand::Help);
    }

    Ok(EstimateCommand::Estimate { description: description.to_owned() })
}

pub struct CommandRouter {
    service: Arc<dyn EstimationService>,
}

impl CommandRouter {
    pub fn new(service: Arc<dyn EstimationService>) -> Self {
        Self { service }
    }

    pub async fn route(&self, payload: &SlashCommandPayload) -> Result<MessageTemplate, CommandParseError> {
        match parse_estimate_command(payload)? {
            EstimateCommand::Help => Ok(blocks::help_message()),
            EstimateCommand::Estimate { description } => {
                let task = Task::new(description).with_requester(payload.user_id.clone());
                Ok(run_estimate(self.service.as_ref(), &task).await)
            }
        }
    }
}

/// Runs one task and renders whatever comes back. Failed responses keep their
/// diagnostic text and are shown as errors.
pub async fn run_estimate(service: &dyn EstimationService, task: &Task) -> MessageTemplate {
    info!(
        event_name = "slack.estimate.started",
        correlation_id = %task.id(),
        requester = task.requester().unwrap_or("unknown"),
        "running estimate for slack request"
    );
    let response = service.estimate(task).await;
    info!(
        event_name = "slack.estimate.completed",
        correlation_id = %task.id(),
        outcome = ?response.outcome,
        "estimate finished"
    );

    match response.outcome {
        ResponseOutcome::Failed => blocks::error_message(&response.text, &task.id().to_string()),
        ResponseOutcome::Answered | ResponseOutcome::NoResult => {
            blocks::estimate_message(&response.text, task.requester(), &task.id().to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use cloudcost_agent::EstimationService;
    use cloudcost_core::{Response, Task};
    use tokio::sync::Mutex;

    /// Answers every task with a fixed response and records what it saw.
    pub(crate) struct RecordingEstimator {
        response: Response,
        tasks: Mutex<Vec<(String, Option<String>)>>,
    }

    impl RecordingEstimator {
        pub(crate) fn new(response: Response) -> Self {
            Self { response, tasks: Mutex::new(Vec::new()) }
        }

        pub(crate) async fn tasks(&self) -> Vec<(String, Option<String>)> {
            self.tasks.lock().await.clone()
        }
    }

    #[async_trait]
    impl EstimationService for RecordingEstimator {
        async fn estimate(&self, task: &Task) -> Response {
            self.tasks
                .lock()
                .await
                .push((task.description().to_owned(), task.requester().map(str::to_owned)));
            self.response.clone()
        }
    }
}
