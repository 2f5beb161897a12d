use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub online: Vec<String>,
}

/// GET /api/presence: currently online user identities, sorted.
async fn get_presence(State(state): State<AppState>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        online: state.tracker.list_snapshot(),
    })
}

/// GET /api/health: liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full axum Router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/api/presence", get(get_presence))
        .route("/api/health", get(health))
        .with_state(state)
}
