use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use cloudcost_core::config::AppConfig;
use serde::Serialize;

/// Static facts about how the estimator was wired, captured at bootstrap.
#[derive(Clone, Debug)]
pub struct HealthState {
    model: String,
    sandbox_endpoint: Option<String>,
    pricing_command: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: format!("{}/{}", config.model.provider, config.model.model),
            sandbox_endpoint: config.sandbox.endpoint.clone(),
            pricing_command: std::iter::once(config.pricing.command.as_str())
                .chain(config.pricing.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            model: "anthropic/claude-3-7-sonnet-20250219".to_owned(),
            sandbox_endpoint: Some("http://sandbox.test".to_owned()),
            pricing_command: "uvx awslabs.aws-pricing-mcp-server@latest".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: HealthCheck,
    pub sandbox: HealthCheck,
    pub pricing: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/ping", get(ping)).route("/health", get(health)).with_state(state)
}

/// Liveness check used by the hosting runtime.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "Healthy" })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let sandbox = match &state.sandbox_endpoint {
        Some(endpoint) => HealthCheck { status: "ready", detail: format!("endpoint {endpoint}") },
        None => HealthCheck { status: "degraded", detail: "sandbox.endpoint is not configured".to_owned() },
    };
    let ready = sandbox.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        model: HealthCheck { status: "ready", detail: state.model.clone() },
        sandbox,
        pricing: HealthCheck { status: "ready", detail: state.pricing_command.clone() },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::{health, ping, HealthState};

    #[tokio::test]
    async fn ping_is_healthy() {
        let Json(payload) = ping().await;
        assert_eq!(payload.status, "Healthy");
    }

    #[tokio::test]
    async fn health_returns_ready_when_sandbox_is_configured() {
        let (status, Json(payload)) = health(State(HealthState::for_tests())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.model.detail, "anthropic/claude-3-7-sonnet-20250219");
    }

    #[tokio::test]
    async fn health_degrades_without_sandbox_endpoint() {
        let state = HealthState { sandbox_endpoint: None, ..HealthState::for_tests() };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.sandbox.status, "degraded");
    }
}
