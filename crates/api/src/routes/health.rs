use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::diagnostics;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the background worker's pid file names a live process.
    pub worker_running: bool,
}

/// GET /health -- gateway liveness plus worker presence.
///
/// The gateway is usable for synchronous calls without a worker, so a
/// missing worker is reported but does not degrade the status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let worker_running = diagnostics::worker_running(&state.config.paths.worker_pid_file).await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        worker_running,
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
