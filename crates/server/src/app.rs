use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use cloudcost_agent::EstimationService;
use cloudcost_core::InterfaceError;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{gateway, health, invocations};

#[derive(Clone)]
pub struct AppState {
    pub estimator: Arc<dyn EstimationService>,
}

impl AppState {
    pub fn new(estimator: Arc<dyn EstimationService>) -> Self {
        Self { estimator }
    }
}

/// Every route the server exposes, with request tracing.
pub fn router(state: AppState, health: health::HealthState) -> Router {
    Router::new()
        .merge(health::router(health))
        .merge(invocations::router(state.clone()))
        .merge(gateway::router(state))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

/// Interface failures rendered as user-safe JSON; internal detail only reaches the log.
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "interface.request_rejected",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "request rejected"
        );

        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use cloudcost_agent::EstimationService;
    use cloudcost_core::{Response, Task, TaskId};
    use tokio::sync::Mutex;

    /// Echoes a fixed response and keeps every task it was asked about.
    pub(crate) struct FixedEstimator {
        pub(crate) response: Response,
        pub(crate) seen: Mutex<Vec<String>>,
        pub(crate) ids: Mutex<Vec<TaskId>>,
    }

    impl FixedEstimator {
        pub(crate) fn new(response: Response) -> Self {
            Self { response, seen: Mutex::new(Vec::new()), ids: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl EstimationService for FixedEstimator {
        async fn estimate(&self, task: &Task) -> Response {
            self.seen.lock().await.push(task.description().to_owned());
            self.ids.lock().await.push(task.id().clone());
            self.response.clone()
        }
    }
}
