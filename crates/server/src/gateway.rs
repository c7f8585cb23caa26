//! Gateway tool target: `POST /gateway/tools`.
//!
//! The gateway names tools `<Target>___<tool>`; the target prefix is stripped
//! before dispatch. Results use the gateway's `{statusCode, body}` envelope, so
//! the HTTP status is always 200.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use cloudcost_core::Task;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::app::AppState;

pub const ESTIMATION_TOOL: &str = "aws_cost_estimation";
pub const TARGET_DELIMITER: &str = "___";

#[derive(Debug, Deserialize)]
pub struct GatewayToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct GatewayToolResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl GatewayToolResponse {
    fn ok(body: String) -> Self {
        Self { status_code: 200, body }
    }

    fn bad_request(body: impl Into<String>) -> Self {
        Self { status_code: 400, body: body.into() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/gateway/tools", post(call_tool)).with_state(state)
}

pub fn strip_target_prefix(tool_name: &str) -> &str {
    tool_name.split_once(TARGET_DELIMITER).map_or(tool_name, |(_, tool)| tool)
}

pub async fn call_tool(
    State(state): State<AppState>,
    payload: Result<Json<GatewayToolRequest>, JsonRejection>,
) -> Json<GatewayToolResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let reason = rejection.body_text();
            warn!(event_name = "ingress.gateway.invalid_body", error = %reason, "unreadable gateway request");
            return Json(GatewayToolResponse::bad_request(format!("Invalid request body: {reason}")));
        }
    };

    let tool = strip_target_prefix(&request.tool_name);
    if tool != ESTIMATION_TOOL {
        warn!(event_name = "ingress.gateway.unknown_tool", tool_name = %request.tool_name, "unknown gateway tool");
        return Json(GatewayToolResponse::bad_request(format!("Unknown tool: {tool}")));
    }

    let description = request
        .arguments
        .get("architecture_description")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if description.is_empty() {
        return Json(GatewayToolResponse::bad_request("Missing required parameter: architecture_description"));
    }

    let task = Task::new(description);
    info!(event_name = "ingress.gateway.tool_call", correlation_id = %task.id(), tool = tool, "gateway tool call");
    let response = state.estimator.estimate(&task).await;

    Json(GatewayToolResponse::ok(response.into_text()))
}
