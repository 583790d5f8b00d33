//! `axum::Router` assembly for the HTTP gateway (§6 HTTP gateway).

use crate::mcp::{self, McpRequest, McpResponse};
use crate::state::GatewayState;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dozor_proto::InboundMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// `POST /webhook` bodies larger than this are rejected before parsing.
const MAX_WEBHOOK_BODY_BYTES: usize = 32 * 1024;

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/mcp/", post(handle_mcp))
        .route("/health", get(handle_health))
        .route("/webhook", post(handle_webhook).layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_BYTES)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_mcp(State(state): State<Arc<GatewayState>>, Json(request): Json<McpRequest>) -> Json<McpResponse> {
    Json(mcp::handle(&state, request).await)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'static str>,
}

async fn handle_health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let mode = state.dev_mode.is_enabled().then_some("dev");
    Json(HealthResponse { status: "ok", service: "dozor", version: env!("CARGO_PKG_VERSION"), mode })
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Accepts `{text|message}` JSON or a raw body, and publishes it to the
/// inbound bus tagged `webhook` (§6 collaborator contracts).
async fn handle_webhook(State(state): State<Arc<GatewayState>>, body: axum::body::Bytes) -> impl IntoResponse {
    let raw = String::from_utf8_lossy(&body).into_owned();
    let text = match serde_json::from_str::<WebhookBody>(&raw) {
        Ok(parsed) => parsed.text.or(parsed.message).unwrap_or(raw),
        Err(_) => raw,
    };
    if text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "empty webhook body"})));
    }
    info!(len = text.len(), "webhook message received");
    state.bus.publish_inbound(InboundMessage::new(text, "webhook"));
    (StatusCode::ACCEPTED, Json(Value::Null))
}
