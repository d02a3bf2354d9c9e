//! Prometheus Metrics
//!
//! Defines and initializes all Prometheus metrics for the gateway.
//!
//! Metrics tracked:
//! - `aircat_sessions_active` - gauge of open device connections
//! - `aircat_frames_total` - counter of reads by result (decoded, out_of_bounds, malformed)
//! - `aircat_registry_entries` - gauge of devices in the local registry
//! - `aircat_registry_lookup_duration_seconds` - histogram of registry `get` latency
//! - `aircat_dispatch_total` - counter of control commands by outcome
//! - `aircat_relay_duration_seconds` - histogram of inter-node relay latency
//! - `aircat_telemetry_writes_total` - counter of sink writes by result

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// State containing the Prometheus handle for metrics export
#[derive(Clone)]
pub struct MetricsState {
    pub prometheus_handle: PrometheusHandle,
}

/// Initialize Prometheus metrics and return the handle for exporting.
pub fn init_metrics() -> Result<MetricsState, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metric_descriptions();

    Ok(MetricsState {
        prometheus_handle: handle,
    })
}

fn register_metric_descriptions() {
    // Sessions
    describe_gauge!("aircat_sessions_active", "Number of open device connections");
    describe_counter!(
        "aircat_frames_total",
        "Total number of device reads by decode result"
    );

    // Registry
    describe_gauge!(
        "aircat_registry_entries",
        "Number of devices in the local connection registry"
    );
    describe_histogram!(
        "aircat_registry_lookup_duration_seconds",
        "Duration of registry lookups in seconds"
    );

    // Control plane
    describe_counter!(
        "aircat_dispatch_total",
        "Total number of control commands by outcome"
    );
    describe_histogram!(
        "aircat_relay_duration_seconds",
        "Duration of inter-node relay requests in seconds"
    );

    // Telemetry
    describe_counter!(
        "aircat_telemetry_writes_total",
        "Total number of telemetry writes by result"
    );
}

/// Record that a device session opened
pub fn record_session_opened() {
    gauge!("aircat_sessions_active").increment(1.0);
}

/// Record that a device session closed
pub fn record_session_closed() {
    gauge!("aircat_sessions_active").decrement(1.0);
}

/// Record one read from a device
pub fn record_frame(result: &'static str) {
    counter!("aircat_frames_total", "result" => result).increment(1);
}

/// Update the registry size gauge
pub fn set_registry_entries(count: usize) {
    gauge!("aircat_registry_entries").set(count as f64);
}

/// Record registry lookup latency
pub fn record_registry_lookup(duration: Duration) {
    histogram!("aircat_registry_lookup_duration_seconds").record(duration.as_secs_f64());
}

/// Record a dispatch outcome
pub fn record_dispatch(outcome: &'static str) {
    counter!("aircat_dispatch_total", "outcome" => outcome).increment(1);
}

/// Record relay latency
pub fn record_relay_duration(duration: Duration) {
    histogram!("aircat_relay_duration_seconds").record(duration.as_secs_f64());
}

/// Record a telemetry write result
pub fn record_telemetry_write(result: &'static str) {
    counter!("aircat_telemetry_writes_total", "result" => result).increment(1);
}
