//! Liveness endpoints.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Plain-text ping, kept for compatibility with existing deployments
pub async fn ping(State(state): State<AppState>) -> String {
    format!(
        "pong. {}.\nSTORAGE={}",
        chrono::Utc::now(),
        state.config.storage
    )
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
