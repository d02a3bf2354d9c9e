//! Application State
//!
//! Shared state passed to all API handlers.

use crate::dispatch::ControlDispatcher;
use crate::observability::MetricsState;
use crate::registry::RegistryHandle;
use crate::telemetry::TelemetryBackend;
use kameo::actor::ActorRef;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub node_id: String,
    pub dispatcher: ActorRef<ControlDispatcher>,
    pub registry: RegistryHandle,
    pub telemetry: Arc<dyn TelemetryBackend>,
    pub metrics_state: Option<MetricsState>,
}
