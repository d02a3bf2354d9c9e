//! ControlDispatcher Message Types

use crate::cluster::{DirectoryError, RelayError};
use crate::registry::RegistryError;
use aircat_core::{DeviceId, FrameError};
use kameo::Reply;
use thiserror::Error;

/// Where a command entered the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Operator request on this node's control plane
    Operator,
    /// Forwarded by a peer node; resolved locally only
    Relayed,
}

/// A control payload addressed to one device.
#[derive(Debug, Clone)]
pub struct ControlCommand {
    pub device_id: DeviceId,
    /// JSON body, passed through to the device unchanged
    pub payload: String,
    pub origin: CommandOrigin,
}

impl ControlCommand {
    pub fn new(device_id: DeviceId, payload: impl Into<String>, origin: CommandOrigin) -> Self {
        Self {
            device_id,
            payload: payload.into(),
            origin,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("device is not connected to any known node")]
    UnknownDevice,
    #[error("device connection broken: {0}")]
    ConnectionBroken(#[source] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("cannot encode control frame: {0}")]
    Encode(#[from] FrameError),
}

impl DispatchError {
    /// Short reason used in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchError::UnknownDevice => "unknown_device",
            DispatchError::ConnectionBroken(_) => "connection_broken",
            DispatchError::Registry(RegistryError::Timeout(_)) => "registry_timeout",
            DispatchError::Registry(RegistryError::Closed) => "registry_closed",
            DispatchError::Directory(_) => "directory",
            DispatchError::Relay(_) => "relay",
            DispatchError::Encode(_) => "encode",
        }
    }
}

/// Result of one dispatch.
#[derive(Debug, Reply)]
pub enum DispatchOutcome {
    /// Written to the local connection
    Delivered,
    /// Accepted by the node that owns the device
    Redirected { node: String },
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Delivered => "delivered",
            DispatchOutcome::Redirected { .. } => "redirected",
            DispatchOutcome::Failed(e) => e.label(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}
