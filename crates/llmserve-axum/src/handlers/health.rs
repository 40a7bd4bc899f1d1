//! Liveness and readiness endpoints.

use axum::extract::State;

use crate::error::HttpError;
use crate::state::AppState;

/// Health check endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Ready when the engine answers its own health probe.
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str, HttpError> {
    state.engine.health().await?;
    Ok("ready")
}
