//! SeatWatch HTTP API
//!
//! Axum server that feeds inbound chat events into the conversation and
//! exposes the monitor for manual runs.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - GET  /health      : health check with store status
//! - GET  /version     : server version info
//! - POST /events      : one inbound message or button press
//! - POST /monitor/run : run a monitor tick now

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use seatwatch_core::config::HttpConfig;
use seatwatch_core::store::RequestStore;

use crate::conversation::{ConversationService, Outcome};
use crate::events::Event;
use crate::subsystems::monitor::{run_monitor_tick, MonitorContext};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub conversation: Arc<ConversationService>,
    pub monitor: Arc<MonitorContext>,
    pub store: Arc<dyn RequestStore>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/events", post(events_handler))
        .route("/monitor/run", post(monitor_run_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("SeatWatch HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// A message (`text`) or a button press (`choice`) from one user.
#[derive(Debug, Deserialize)]
pub struct InboundEvent {
    pub user_id: String,
    pub text: Option<String>,
    pub choice: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: asks the request store for its status.
pub async fn health_inner(store: &dyn RequestStore) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": backend,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "seatwatch/1",
    })
}

/// Inner events: classify the payload and run it through the conversation.
pub async fn events_inner(
    conversation: &ConversationService,
    req: InboundEvent,
) -> (StatusCode, serde_json::Value) {
    let event = match (req.text.as_deref(), req.choice.as_deref()) {
        (_, Some(choice)) => Event::from_choice(choice),
        (Some(text), None) => Event::from_text(text),
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": "text or choice field is required",
                    "status": "error",
                }),
            );
        }
    };

    let Some(event) = event else {
        tracing::debug!(user_id = %req.user_id, "Ignoring unrecognised event");
        return (
            StatusCode::OK,
            serde_json::json!({
                "status": "ignored",
                "replies": [],
            }),
        );
    };

    match conversation.handle(&req.user_id, event).await {
        Outcome::Denied(reply) => (
            StatusCode::FORBIDDEN,
            serde_json::json!({
                "status": "denied",
                "replies": [reply],
            }),
        ),
        Outcome::Replies(replies) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "replies": replies,
            }),
        ),
    }
}

/// Inner monitor run: one tick, reported as JSON.
pub async fn monitor_run_inner(monitor: &MonitorContext) -> (StatusCode, serde_json::Value) {
    tracing::info!("Manual monitor tick triggered");
    match run_monitor_tick(monitor).await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "report": report,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "error": e.to_string(),
                "status": "error",
            }),
        ),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn events_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<InboundEvent>,
) -> impl IntoResponse {
    let (status, body) = events_inner(&state.conversation, req).await;
    (status, Json(body))
}

pub async fn monitor_run_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = monitor_run_inner(&state.monitor).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
