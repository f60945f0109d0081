//! HTTP API.
//!
//! - POST /api/chat
//! - POST /api/suggestions
//! - POST /api/slack-message
//! - POST /api/research
//! - POST /api/model-router
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::RelayMetrics;
use crate::producer::{SharedSearch, UiMessage};
use crate::relay::{spawn_session, SessionContext, SharedIds, Workflow};
use crate::server::streaming::sse_response;
use crate::workflows::{Chat, ModelRouter, Models, Research, SlackMessage, Suggestions};

/// Application state shared across handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub models: Models,
    pub search: SharedSearch,
    pub ids: SharedIds,
    pub metrics: Arc<RelayMetrics>,
    pub start_time: Instant,

    /// One permit per streaming session, held until its response body is
    /// dropped.
    sessions: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        models: Models,
        search: SharedSearch,
        ids: SharedIds,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        let sessions = Arc::new(Semaphore::new(config.server.max_concurrent_requests));
        Self {
            config,
            models,
            search,
            ids,
            metrics,
            start_time: Instant::now(),
            sessions,
        }
    }

    /// Session slots not currently held by a streaming response.
    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    fn session_context(&self) -> SessionContext {
        SessionContext::new(&self.config.relay, self.ids.clone()).with_metrics(self.metrics.clone())
    }

    /// Run `workflow` in a new session and stream its parts as SSE.
    ///
    /// Waits for a session slot first; the request timeout bounds the wait.
    async fn relay<W: Workflow>(&self, workflow: W) -> Response {
        let permit = match self.sessions.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("Session slots unavailable: {e}");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        };

        let parts = spawn_session(&self.session_context(), workflow);
        sse_response(
            parts,
            Some(self.metrics.clone()),
            Some(permit),
            Duration::from_secs(self.config.relay.keep_alive_secs),
        )
        .into_response()
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.server.request_timeout_secs));

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/suggestions", post(suggestions))
        .route("/api/slack-message", post(slack_message))
        .route("/api/research", post(research))
        .route("/api/model-router", post(model_router))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(timeout)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Body of every workflow route.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<UiMessage>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub active_sessions: i64,
    pub available_slots: usize,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    info!(messages = req.messages.len(), "Chat request");
    state.relay(Chat {
        model: state.models.advanced.clone(),
        messages: req.messages,
    })
    .await
}

async fn suggestions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    info!(messages = req.messages.len(), "Suggestions request");
    state.relay(Suggestions {
        model: state.models.advanced.clone(),
        messages: req.messages,
    })
    .await
}

async fn slack_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    info!(messages = req.messages.len(), "Slack message request");
    state.relay(SlackMessage {
        model: state.models.advanced.clone(),
        messages: req.messages,
    })
    .await
}

async fn research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    info!(messages = req.messages.len(), "Research request");
    state.relay(Research {
        model: state.models.basic.clone(),
        search: state.search.clone(),
        max_results: state.config.search.max_results,
        messages: req.messages,
    })
    .await
}

async fn model_router(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    info!(messages = req.messages.len(), "Model router request");
    state.relay(ModelRouter {
        models: state.models.clone(),
        messages: req.messages,
    })
    .await
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.metrics.active_sessions(),
        available_slots: state.available_sessions(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
