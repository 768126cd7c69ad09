//! HTTP surface: one invoke and one stream route per registered agent.
//!
//! ```text
//! POST /{agent}/invoke   {"message", "thread_id"?}                    -> {"type":"ai","content"}
//! POST /{agent}/stream   {"message", "thread_id"?, "stream_tokens"?}  -> text/event-stream
//! GET  /health                                                        -> {"status":"ok","agents":[..]}
//! ```

pub mod error;
pub mod sse;

pub use error::ApiError;
pub use sse::sse_response;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::{definitions, BuildContext};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::relay::{AgentRegistry, ChatMessage};

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
}

/// Body of `POST /{agent}/invoke`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Body of `POST /{agent}/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInput {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default = "default_stream_tokens")]
    pub stream_tokens: bool,
}

fn default_stream_tokens() -> bool {
    true
}

/// Build the router over a fixed registry.
pub fn router(registry: Arc<AgentRegistry>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route("/:agent/invoke", post(invoke))
        .route("/:agent/stream", post(stream))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "agents": state.registry.names() }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

async fn invoke(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    payload: std::result::Result<Json<UserInput>, JsonRejection>,
) -> std::result::Result<Json<ChatMessage>, ApiError> {
    let Json(input) = payload?;
    let handle = state.registry.get(&agent)?;
    let message = require_message(&input.message)?;
    // Any failure inside the turn is a 500, whatever its category.
    let reply = handle
        .invoke(message, input.thread_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(reply))
}

async fn stream(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    payload: std::result::Result<Json<StreamInput>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(input) = payload?;
    let handle = state.registry.get(&agent)?;
    let message = require_message(&input.message)?;
    let events = handle.stream(message, input.thread_id, input.stream_tokens);
    Ok(sse_response(sse::frames(events)))
}

fn require_message(message: &str) -> std::result::Result<&str, ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    Ok(message)
}

/// Build every catalog agent from `config`.
pub fn build_registry(config: &RelayConfig) -> AgentRegistry {
    let ctx = BuildContext::new(config.clone());
    AgentRegistry::from_definitions(&definitions(), &ctx)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(
    config: &RelayConfig,
    registry: Arc<AgentRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, agents = ?registry.names(), "relay listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(RelayError::from)?;
    info!("relay stopped");
    Ok(())
}
