//! HTTP API for the topology frontend.
//!
//! Handlers only read the published snapshot or hand work to the scan
//! coordinator; network collaborators are never called while a request
//! holds a lock.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::alerts::AlertPipeline;
use crate::cycle::{CycleReport, ScanCoordinator};
use crate::error::{DiscoverError, Result};
use crate::notify::Notifier;
use crate::sources::Advisor;

const AI_OFFLINE: &str = "Local AI is not connected. Please ensure Ollama is running.";
const AI_FAILED: &str = "Failed to communicate with Local AI.";

/// Shared state behind every handler.
pub struct AppState {
    pub coordinator: Arc<ScanCoordinator>,
    pub alerts: AlertPipeline,
    pub advisor: Arc<dyn Advisor>,
    pub notifier: Arc<Notifier>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub nodes: usize,
    pub edges: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Build the API router.
///
/// - `GET /`, `GET /health`
/// - `POST /api/scan` starts a cycle (202) or reports busy (409)
/// - `GET /api/graph`, `GET /api/status`, `GET /api/alerts`
/// - `POST /api/alerts/test-notify`, `POST /api/ai/chat`
pub fn create_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/scan", post(scan_handler))
        .route("/graph", get(graph_handler))
        .route("/status", get(status_handler))
        .route("/alerts", get(alerts_handler))
        .route("/alerts/test-notify", post(test_notify_handler))
        .route("/ai/chat", post(chat_handler))
        .with_state(state);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind and serve until the listener fails.
pub async fn start_server(state: Arc<AppState>, bind_addr: &str, allowed_origins: &[String]) -> Result<()> {
    let app = create_router(state, allowed_origins);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({"status": "Network Monitor Backend Running"}))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn scan_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.trigger() {
        Ok(scan_id) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "started", "scan_id": scan_id})),
        ),
        Err(e @ DiscoverError::CycleInProgress) => (
            StatusCode::CONFLICT,
            Json(json!({"status": "busy", "message": e.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": e.to_string()})),
        ),
    }
}

async fn graph_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.coordinator.store().snapshot();
    Json(snapshot.as_ref().clone())
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.coordinator.store().snapshot();
    Json(StatusResponse {
        running: state.coordinator.is_running(),
        nodes: snapshot.nodes.len(),
        edges: snapshot.edges.len(),
        last_update: snapshot.last_update,
        last_cycle: state.coordinator.last_report(),
    })
}

async fn alerts_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.coordinator.store().snapshot();
    Json(state.alerts.evaluate(&snapshot).await)
}

async fn test_notify_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.notifier.is_enabled() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "Notification topic not configured"})),
        );
    }
    match state.notifier.send_test().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "success", "message": "Test notification sent"})),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Test notification failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
        }
    }
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    if !state.advisor.available().await {
        return Json(ChatResponse {
            response: AI_OFFLINE.to_string(),
        });
    }

    let snapshot = state.coordinator.store().snapshot();
    let response = match state.advisor.chat(&request.message, &snapshot).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %e, "Advisory chat failed");
            AI_FAILED.to_string()
        }
    };
    Json(ChatResponse { response })
}
