//! HTTP API Module
//!
//! REST control plane for the gateway.
//!
//! This module contains:
//! - `state`: Shared application state
//! - `health`: Liveness and readiness probes
//! - `metrics`: Prometheus metrics endpoint
//! - `devices`: Telemetry queries, operator commands and relay ingress

mod devices;
mod health;
mod metrics;
mod state;

pub use state::AppState;

use axum::{routing::get, Router};

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/healthz", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Observability
        .route("/metrics", get(metrics::get_metrics))
        // Devices
        .route(
            "/v1/aircat/{id}",
            get(devices::get_latest)
                .put(devices::put_command)
                .post(devices::relay_command),
        )
        .with_state(state)
}
