//! Device Session
//!
//! One session per accepted device connection:
//!
//! ```text
//! Connected ──first decoded frame──> Registered ──EOF / read error──> Closed
//!     │                                                                  ▲
//!     └───────────────────────EOF / read error───────────────────────────┘
//! ```
//!
//! Each read is one frame. Registration inserts the connection into the local
//! registry and queues this node's address for the cluster directory. From
//! then on every frame with a payload, the first one included, goes to
//! telemetry. On close a registered session issues exactly one registry
//! delete; the directory entry stays.

use crate::cluster::DirectoryPublisher;
use crate::observability::{events, metrics};
use crate::registry::{ConnectionHandle, RegistryEntry, RegistryHandle};
use crate::telemetry::TelemetryHandle;
use aircat_core::{DeviceId, Frame, FrameError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Shared dependencies handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: RegistryHandle,
    pub telemetry: TelemetryHandle,
    pub directory: Option<DirectoryPublisher>,
    pub read_buffer_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Registered { device_id: DeviceId },
    Closed,
}

/// Summary returned when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub device_id: Option<DeviceId>,
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub reason: String,
}

pub struct DeviceSession<R> {
    reader: R,
    connection: ConnectionHandle,
    /// Address published to the directory for this device
    node_addr: String,
    ctx: SessionContext,
    state: SessionState,
    frames_decoded: u64,
    frames_dropped: u64,
}

impl<R> DeviceSession<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: R,
        connection: ConnectionHandle,
        node_addr: String,
        ctx: SessionContext,
    ) -> Self {
        Self {
            reader,
            connection,
            node_addr,
            ctx,
            state: SessionState::Connected,
            frames_decoded: 0,
            frames_dropped: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Read frames until the peer closes or a read fails.
    pub async fn run(mut self) -> SessionReport {
        metrics::record_session_opened();
        events::device_connected(
            &self.connection.peer().to_string(),
            self.connection.id().get(),
        );

        let mut buf = vec![0u8; self.ctx.read_buffer_size.max(1)];
        let reason = loop {
            match self.reader.read(&mut buf).await {
                Ok(0) => break "peer closed".to_string(),
                Ok(n) => self.handle_read(&buf[..n]).await,
                Err(e) => break e.to_string(),
            }
        };

        self.close(reason).await
    }

    async fn handle_read(&mut self, bytes: &[u8]) {
        match Frame::decode(bytes) {
            Ok(frame) => {
                metrics::record_frame("decoded");
                self.frames_decoded += 1;
                self.handle_frame(frame).await;
            }
            Err(FrameError::SizeOutOfBounds { len }) => {
                metrics::record_frame("out_of_bounds");
                self.frames_dropped += 1;
                debug!(
                    connection = %self.connection.id(),
                    len,
                    "Dropped frame with invalid size"
                );
            }
            Err(e) => {
                metrics::record_frame("malformed");
                self.frames_dropped += 1;
                debug!(
                    connection = %self.connection.id(),
                    error = %e,
                    "Dropped malformed frame"
                );
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) {
        if self.state == SessionState::Connected {
            self.register(&frame).await;
        }

        let SessionState::Registered { device_id } = &self.state else {
            return;
        };

        if frame.device_id() != *device_id {
            debug!(
                device_id = %device_id,
                frame_device_id = %frame.device_id(),
                "Frame identity differs from registered device"
            );
        }

        if frame.has_payload() {
            self.ctx.telemetry.emit(device_id, &frame.payload);
        }
    }

    async fn register(&mut self, frame: &Frame) {
        let device_id = frame.device_id();
        let entry = RegistryEntry::new(self.connection.clone(), frame.clone());

        if let Err(e) = self.ctx.registry.insert(entry).await {
            warn!(device_id = %device_id, error = %e, "Registry insert failed");
        }

        // Directory publish runs independently of the registry insert
        if let Some(directory) = &self.ctx.directory {
            directory.publish(&device_id, &self.node_addr);
        }

        events::device_registered(
            device_id.as_str(),
            &self.connection.peer().to_string(),
            &self.node_addr,
        );
        self.state = SessionState::Registered { device_id };
    }

    async fn close(mut self, reason: String) -> SessionReport {
        self.connection.close().await;

        let device_id = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Registered { device_id } => Some(device_id),
            _ => None,
        };

        if let Some(device_id) = &device_id {
            if let Err(e) = self
                .ctx
                .registry
                .delete(device_id.clone(), self.connection.id())
                .await
            {
                warn!(device_id = %device_id, error = %e, "Registry delete failed");
            }
        }

        events::device_disconnected(
            device_id.as_ref().map(DeviceId::as_str),
            &self.connection.peer().to_string(),
            &reason,
        );
        metrics::record_session_closed();

        SessionReport {
            device_id,
            frames_decoded: self.frames_decoded,
            frames_dropped: self.frames_dropped,
            reason,
        }
    }
}
