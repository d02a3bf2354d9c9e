//! Structured Events
//!
//! One function per device or command lifecycle event so field names stay
//! consistent across the gateway. Every event carries an `event_type` field.
//!
//! Event types:
//! - `device_connected` - TCP connection accepted
//! - `device_registered` - First valid frame decoded, device entered the registry
//! - `device_disconnected` - Session ended
//! - `command_dispatched` - Control command resolved (delivered, redirected, failed)
//! - `directory_upsert_failed` - Cluster directory write failed
//! - `telemetry_dropped` - Telemetry queue full, measurement discarded

use tracing::{info, warn};

/// Emit a device connected event
pub fn device_connected(peer: &str, connection_id: u64) {
    info!(
        event_type = "device_connected",
        peer = %peer,
        connection_id = connection_id,
        "Device connected"
    );
}

/// Emit a device registered event
pub fn device_registered(device_id: &str, peer: &str, node_addr: &str) {
    info!(
        event_type = "device_registered",
        device_id = %device_id,
        peer = %peer,
        node_addr = %node_addr,
        "Device registered"
    );
}

/// Emit a device disconnected event
pub fn device_disconnected(device_id: Option<&str>, peer: &str, reason: &str) {
    info!(
        event_type = "device_disconnected",
        device_id = device_id.unwrap_or("-"),
        peer = %peer,
        reason = %reason,
        "Device disconnected"
    );
}

/// Emit a command dispatched event
pub fn command_dispatched(device_id: &str, outcome: &str, detail: Option<&str>) {
    match detail {
        None => info!(
            event_type = "command_dispatched",
            device_id = %device_id,
            outcome = %outcome,
            "Command dispatched"
        ),
        Some(detail) => warn!(
            event_type = "command_dispatched",
            device_id = %device_id,
            outcome = %outcome,
            detail = %detail,
            "Command not delivered"
        ),
    }
}

/// Emit a directory upsert failure event
pub fn directory_upsert_failed(device_id: &str, node_addr: &str, error: &str) {
    warn!(
        event_type = "directory_upsert_failed",
        device_id = %device_id,
        node_addr = %node_addr,
        error = %error,
        "Failed to publish device location"
    );
}

/// Emit a telemetry dropped event
pub fn telemetry_dropped(device_id: &str, reason: &str) {
    warn!(
        event_type = "telemetry_dropped",
        device_id = %device_id,
        reason = %reason,
        "Telemetry dropped"
    );
}
