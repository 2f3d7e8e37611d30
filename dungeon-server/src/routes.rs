//! HTTP routes over the game session.
//!
//! Handlers are thin: each one forwards to [`GameSession`] and returns its
//! payload as JSON. Game failures arrive inside the payload, so every
//! well-formed request gets a 200.

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use dungeon_core::dm::MemorySnapshot;
use dungeon_core::{GameSession, PlayResponse, ResetResponse, StartResponse, UndoResponse};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub genre: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub action: String,
}

/// Build the application router around a shared session.
pub fn build_router(session: Arc<GameSession>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/start", post(start_handler))
        .route("/play", post(play_handler))
        .route("/undo", post(undo_handler))
        .route("/reset", post(reset_handler))
        .route("/journal", get(journal_handler))
        .route("/health", get(health_handler))
        .with_state(session)
        .layer(build_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS for browser front ends. An empty list or `*` allows any origin.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

async fn start_handler(
    State(session): State<Arc<GameSession>>,
    Json(request): Json<StartRequest>,
) -> Json<StartResponse> {
    Json(session.start(&request.genre).await)
}

async fn play_handler(
    State(session): State<Arc<GameSession>>,
    Json(request): Json<PlayRequest>,
) -> Json<PlayResponse> {
    Json(session.play(&request.action).await)
}

async fn undo_handler(State(session): State<Arc<GameSession>>) -> Json<UndoResponse> {
    Json(session.undo().await)
}

async fn reset_handler(State(session): State<Arc<GameSession>>) -> Json<ResetResponse> {
    Json(session.reset().await)
}

async fn journal_handler(State(session): State<Arc<GameSession>>) -> Json<MemorySnapshot> {
    Json(session.journal().await)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "dungeon"}))
}
