//! Health Check Endpoints
//!
//! Liveness and readiness probe handlers.

use super::state::AppState;
use axum::{extract::State, http::StatusCode};

/// Liveness probe endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe endpoint. Not ready once the registry or dispatcher is gone.
#[tracing::instrument(skip(state), fields(node_id = %state.node_id))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.registry.is_closed() || !state.dispatcher.is_alive() {
        tracing::warn!("Gateway not ready");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok("READY")
}
