//! Incremental estimate output for streaming delivery surfaces.

use cloudcost_core::{Response, ResponseOutcome};
use serde::Serialize;
use tokio::sync::mpsc;

/// One chunk of a streaming estimate. Serializes as `{"data": ..}` or
/// `{"error": true, "data": ..}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EstimateEvent {
    Data(String),
    Error(String),
}

#[derive(Serialize)]
struct EventPayload<'a> {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    error: bool,
    data: &'a str,
}

impl Serialize for EstimateEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Data(data) => EventPayload { error: false, data }.serialize(serializer),
            Self::Error(data) => EventPayload { error: true, data }.serialize(serializer),
        }
    }
}

/// Turns possibly-overlapping text chunks into deltas. A chunk that extends the
/// previous one yields only its new suffix; anything else is passed through whole.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    accumulated: String,
}

impl DeltaTracker {
    pub fn delta(&mut self, chunk: &str) -> Option<String> {
        if chunk.is_empty() {
            return None;
        }

        let delta = match chunk.strip_prefix(self.accumulated.as_str()) {
            Some("") => return None,
            Some(suffix) => suffix.to_owned(),
            None => chunk.to_owned(),
        };
        self.accumulated = chunk.to_owned();
        Some(delta)
    }
}

/// Forwards model text to a stream consumer as it is produced.
pub(crate) struct DeltaSink {
    events: mpsc::Sender<EstimateEvent>,
    tracker: DeltaTracker,
}

impl DeltaSink {
    pub(crate) fn new(events: mpsc::Sender<EstimateEvent>) -> Self {
        Self { events, tracker: DeltaTracker::default() }
    }

    pub(crate) async fn turn_text(&mut self, text: &str) {
        if let Some(delta) = self.tracker.delta(text) {
            // A consumer that went away does not stop the task.
            let _ = self.events.send(EstimateEvent::Data(delta)).await;
        }
    }

    /// Emits whatever the final response adds beyond the streamed turns.
    pub(crate) async fn finish(self, response: &Response) {
        let closing = match response.outcome {
            ResponseOutcome::Answered => None,
            ResponseOutcome::NoResult => Some(EstimateEvent::Data(response.text.clone())),
            ResponseOutcome::Failed => Some(EstimateEvent::Error(response.text.clone())),
        };
        if let Some(event) = closing {
            let _ = self.events.send(event).await;
        }
    }
}
