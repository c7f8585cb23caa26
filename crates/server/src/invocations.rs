//! Hosting-runtime entrypoints: `POST /invocations` with `{"prompt": ".."}`,
//! answered with the estimate as plain text, and `POST /invocations/stream`,
//! answered with server-sent events carrying the estimate as it is produced.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use cloudcost_agent::EstimateEvent;
use cloudcost_core::{ApplicationError, Task, TaskId};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::{ApiError, AppState};

/// Set by the hosting runtime (and the CLI invoke client) on every call.
pub const SESSION_HEADER: &str = "x-amzn-bedrock-agentcore-runtime-session-id";

const STREAM_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invocations", post(invoke))
        .route("/invocations/stream", post(invoke_stream))
        .with_state(state)
}

/// The runtime session id when present, so log lines and the task share one id.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned)
}

fn task_from(
    payload: Result<Json<InvocationRequest>, JsonRejection>,
    correlation_id: &str,
) -> Result<Task, ApiError> {
    let prompt = match payload {
        Ok(Json(request)) => request.prompt.unwrap_or_default(),
        Err(rejection) => {
            return Err(ApiError(
                ApplicationError::Validation(rejection.body_text()).into_interface(correlation_id),
            ));
        }
    };

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError(
            ApplicationError::Validation("prompt is required".to_owned()).into_interface(correlation_id),
        ));
    }
    Ok(Task::with_id(TaskId(correlation_id.to_owned()), prompt))
}

/// Failed estimates are still answered with 200: the diagnostic text is the
/// response body.
pub async fn invoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<InvocationRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let correlation_id = correlation_id(&headers);
    let task = task_from(payload, &correlation_id)?;

    info!(event_name = "ingress.http.invocation", correlation_id = %correlation_id, "invocation received");
    let response = state.estimator.estimate(&task).await;
    Ok(response.into_text())
}

/// Each event is `{"data": ".."}`; a failed estimate ends with
/// `{"error": true, "data": ".."}`. The estimate runs to completion even if the
/// client disconnects, so its sandbox session is always released.
pub async fn invoke_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<InvocationRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let task = task_from(payload, &correlation_id)?;

    info!(event_name = "ingress.http.invocation_stream", correlation_id = %correlation_id, "streaming invocation received");
    let (events, receiver) = mpsc::channel(STREAM_BUFFER);
    let estimator = Arc::clone(&state.estimator);
    tokio::spawn(async move {
        let response = estimator.estimate_streaming(&task, events).await;
        info!(
            event_name = "ingress.http.invocation_stream_finished",
            correlation_id = %task.id(),
            failed = response.is_failure(),
            "streaming invocation finished"
        );
    });

    let stream = stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        Some((Ok(sse_event(&event)), receiver))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &EstimateEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|error| {
        warn!(event_name = "ingress.http.stream_encode_failed", error = %error, "stream event not encodable");
        Event::default().data(r#"{"error":true,"data":"stream event could not be encoded"}"#)
    })
}
