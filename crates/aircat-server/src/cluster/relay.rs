//! Inter-node command relay

use crate::observability::metrics;
use aircat_core::DeviceId;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("relay rejected with status {0}")]
    Status(StatusCode),
}

/// Forwards a raw control body to the node that owns a device.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    control_port: u16,
}

impl RelayClient {
    pub fn new(control_port: u16, timeout: Duration) -> Result<Self, RelayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, control_port })
    }

    /// Relay ingress URL on `node_addr` for `device_id`.
    pub fn url(&self, node_addr: &str, device_id: &DeviceId) -> String {
        // Bare IPv6 literals need brackets in a URL authority
        let host = if node_addr.contains(':') && !node_addr.starts_with('[') {
            format!("[{node_addr}]")
        } else {
            node_addr.to_string()
        };
        format!("http://{host}:{}/v1/aircat/{device_id}", self.control_port)
    }

    /// POST `payload` unchanged. Only the response status is inspected.
    pub async fn forward(
        &self,
        node_addr: &str,
        device_id: &DeviceId,
        payload: &str,
    ) -> Result<(), RelayError> {
        let url = self.url(node_addr, device_id);
        let started = Instant::now();

        let result = self.http.post(&url).body(payload.to_string()).send().await;
        metrics::record_relay_duration(started.elapsed());

        let status = result?.status();
        debug!(url = %url, status = %status, "Relayed control command");
        if status.is_success() {
            Ok(())
        } else {
            Err(RelayError::Status(status))
        }
    }
}
