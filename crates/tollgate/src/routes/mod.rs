//! HTTP route handlers for Tollgate.
//!
//! Every protocol response is HTTP 200 with an in-band `code`: zero for a
//! well-formed outcome (including a failed puzzle), negative for a
//! protocol-level rejection. Response bodies are explicit structs whose
//! field names are frozen for wire compatibility.

use axum::Json;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod captcha;
mod health;
mod site;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        // Site lifecycle
        .route("/site/create", post(site::create_site))
        .route("/site/read", post(site::read_site))
        .route("/site/update", post(site::update_site))
        // Puzzle endpoints
        .route("/captcha/problem/get", get(captcha::get_problem))
        .route("/captcha/verify", post(captcha::verify_proof))
        // Browsers call the puzzle endpoints from third-party origins
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Protocol-level rejection body
#[derive(Serialize)]
struct ErrorBody {
    code: i32,
    message: String,
}

/// HTTP 200 with a negative in-band code
fn error_response(code: i32, message: impl Into<String>) -> Response {
    Json(ErrorBody {
        code,
        message: message.into(),
    })
    .into_response()
}
