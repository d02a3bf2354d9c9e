//! Telemetry Sink
//!
//! Device measurements flow from sessions into a bounded queue and from there
//! into a [`TelemetryBackend`]:
//!
//! - `writer`: [`TelemetryHandle`] / [`spawn_writer`], non-blocking submission
//!   with a cap on in-flight writes
//! - `influx`: [`InfluxBackend`], InfluxDB 1.x line protocol over HTTP
//! - `memory`: [`MemoryBackend`], latest payload per device kept in memory

mod influx;
mod memory;
mod writer;

pub use influx::{format_line_protocol, AirMeasure, InfluxBackend};
pub use memory::MemoryBackend;
pub use writer::{spawn_writer, Measurement, TelemetryHandle};

use aircat_core::DeviceId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no telemetry recorded for device")]
    NotFound,
    #[error("payload is not a measurement: {0}")]
    InvalidMeasurement(String),
    #[error("telemetry sink request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telemetry sink returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Time-series storage for device measurements.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Store one measurement payload.
    async fn write(&self, device_id: &DeviceId, payload: &str) -> Result<(), SinkError>;

    /// Most recent measurement for the device as JSON bytes.
    async fn query_latest(&self, device_id: &DeviceId) -> Result<Vec<u8>, SinkError>;
}
