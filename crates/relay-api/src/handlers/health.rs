//! Health check handler.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
    /// Approximate number of events waiting in the queue
    pub queue_depth: usize,
}

/// Reports liveness and the current queue depth.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_depth = state.queue.len();
    debug!(queue_depth, "health check");

    Json(HealthResponse { status: "healthy", service: "middleware", queue_depth })
}
