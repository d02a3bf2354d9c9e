//! Bounded telemetry submission
//!
//! Sessions call [`TelemetryHandle::emit`], which never waits: when the queue
//! is full the measurement is dropped and counted. A single writer task drains
//! the queue and runs at most `max_in_flight` backend writes at once.

use super::{SinkError, TelemetryBackend};
use crate::config::TelemetryConfig;
use crate::observability::{events, metrics};
use aircat_core::DeviceId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One queued measurement.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub device_id: DeviceId,
    pub payload: String,
}

/// Cloneable, non-blocking submission side of the telemetry queue.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<Measurement>,
}

impl TelemetryHandle {
    /// Queue a measurement. Returns `false` if it was dropped.
    pub fn emit(&self, device_id: &DeviceId, payload: &str) -> bool {
        let measurement = Measurement {
            device_id: device_id.clone(),
            payload: payload.to_string(),
        };

        match self.tx.try_send(measurement) {
            Ok(()) => true,
            Err(TrySendError::Full(m)) => {
                metrics::record_telemetry_write("dropped");
                events::telemetry_dropped(m.device_id.as_str(), "queue full");
                false
            }
            Err(TrySendError::Closed(m)) => {
                metrics::record_telemetry_write("dropped");
                events::telemetry_dropped(m.device_id.as_str(), "writer stopped");
                false
            }
        }
    }
}

/// Start the writer task for `backend`.
pub fn spawn_writer(
    backend: Arc<dyn TelemetryBackend>,
    config: &TelemetryConfig,
) -> (TelemetryHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let task = tokio::spawn(run_writer(backend, rx, config.max_in_flight.max(1)));
    (TelemetryHandle { tx }, task)
}

async fn run_writer(
    backend: Arc<dyn TelemetryBackend>,
    mut rx: mpsc::Receiver<Measurement>,
    max_in_flight: usize,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight));

    while let Some(measurement) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let backend = backend.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match backend
                .write(&measurement.device_id, &measurement.payload)
                .await
            {
                Ok(()) => metrics::record_telemetry_write("ok"),
                Err(SinkError::InvalidMeasurement(payload)) => {
                    metrics::record_telemetry_write("skipped");
                    debug!(
                        device_id = %measurement.device_id,
                        payload = %payload,
                        "Payload is not a measurement, skipped"
                    );
                }
                Err(e) => {
                    metrics::record_telemetry_write("error");
                    warn!(
                        device_id = %measurement.device_id,
                        error = %e,
                        "Telemetry write failed"
                    );
                }
            }
        });
    }

    // Let in-flight writes finish before reporting the writer stopped
    let _ = permits.acquire_many(max_in_flight as u32).await;
    debug!("Telemetry writer stopped");
}
