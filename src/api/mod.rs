//! HTTP API module - storage queries and node execution

mod storage;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::nodes::NodeRunner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<NodeRunner>,
}

/// Build the API router
pub fn router(runner: Arc<NodeRunner>) -> Router {
    let state = AppState { runner };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(storage::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "loopchain",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.runner.sources().input_dir().is_dir() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                input_dir: "ok",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                input_dir: "missing",
            }),
        )
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    input_dir: &'static str,
}
