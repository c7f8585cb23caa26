use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const NO_RESULT_SENTINEL: &str = "No estimation result.";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cost-estimation request. Fields are fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    description: String,
    requester: Option<String>,
    received_at: DateTime<Utc>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            description: description.into(),
            requester: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_id(id: TaskId, description: impl Into<String>) -> Self {
        Self { id, ..Self::new(description) }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn requester(&self) -> Option<&str> {
        self.requester.as_deref()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// A model-issued request to run a named tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Text fragments emitted by one sandboxed execution, in stream order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalculationResult {
    fragments: Vec<String>,
}

impl CalculationResult {
    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(String::is_empty)
    }

    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}

impl FromIterator<String> for CalculationResult {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { fragments: iter.into_iter().collect() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Answered,
    NoResult,
    Failed,
}

/// Final text handed back to a delivery adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub outcome: ResponseOutcome,
    pub text: String,
}

impl Response {
    /// Builds a response from the model's final text; blank text collapses to the
    /// no-result sentinel.
    pub fn answered(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::no_result();
        }
        Self { outcome: ResponseOutcome::Answered, text }
    }

    pub fn no_result() -> Self {
        Self { outcome: ResponseOutcome::NoResult, text: NO_RESULT_SENTINEL.to_owned() }
    }

    pub fn failed(message: impl fmt::Display) -> Self {
        Self { outcome: ResponseOutcome::Failed, text: diagnostic_message(message) }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ResponseOutcome::Failed
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn diagnostic_message(message: impl fmt::Display) -> String {
    format!("❌ Cost estimation failed: {message}")
}

#[cfg(test)]
mod tests {
    use super::{CalculationResult, Response, ResponseOutcome, Task, NO_RESULT_SENTINEL};

    #[test]
    fn calculation_result_concatenates_in_stream_order() {
        let result: CalculationResult =
            ["12", "0", ".5"].into_iter().map(str::to_owned).collect();

        assert_eq!(result.text(), "120.5");
        assert_eq!(result.fragments().len(), 3);
    }

    #[test]
    fn blank_answer_collapses_to_sentinel() {
        let response = Response::answered("  \n");

        assert_eq!(response.outcome, ResponseOutcome::NoResult);
        assert_eq!(response.text, NO_RESULT_SENTINEL);
    }

    #[test]
    fn failed_response_embeds_message() {
        let response = Response::failed("sandbox quota exhausted");

        assert!(response.is_failure());
        assert_eq!(response.text, "❌ Cost estimation failed: sandbox quota exhausted");
    }

    #[test]
    fn task_keeps_requester_and_description() {
        let task = Task::new("S3 bucket, 100GB, us-east-1").with_requester("U123");

        assert_eq!(task.description(), "S3 bucket, 100GB, us-east-1");
        assert_eq!(task.requester(), Some("U123"));
        assert!(!task.id().0.is_empty());
    }
}
