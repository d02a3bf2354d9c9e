//! Observability Module
//!
//! Logging, events and metrics for the gateway:
//! - `metrics`: Prometheus metrics for sessions, frames, registry and dispatch
//! - `events`: Structured event logging with consistent fields
//! - `tracing`: Subscriber setup with optional OpenTelemetry export

pub mod events;
pub mod metrics;
pub mod tracing;

pub use metrics::{init_metrics, MetricsState};
pub use tracing::{init_tracing, shutdown_tracing, TracingConfig};
