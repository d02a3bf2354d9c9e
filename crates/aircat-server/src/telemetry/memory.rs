//! In-memory backend, used when no InfluxDB address is configured.

use super::{SinkError, TelemetryBackend};
use aircat_core::DeviceId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Keeps only the latest payload per device.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    latest: RwLock<HashMap<DeviceId, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetryBackend for MemoryBackend {
    async fn write(&self, device_id: &DeviceId, payload: &str) -> Result<(), SinkError> {
        info!(device_id = %device_id, payload = %payload, "Telemetry");
        self.latest
            .write()
            .await
            .insert(device_id.clone(), payload.to_string());
        Ok(())
    }

    async fn query_latest(&self, device_id: &DeviceId) -> Result<Vec<u8>, SinkError> {
        self.latest
            .read()
            .await
            .get(device_id)
            .map(|payload| payload.clone().into_bytes())
            .ok_or(SinkError::NotFound)
    }
}
