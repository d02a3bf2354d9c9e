//! Connection Registry
//!
//! Per-node map from [`DeviceId`] to the live connection holding that device.
//!
//! ## Architecture
//!
//! ```text
//! DeviceSession ──insert/delete──┐
//!                                ├──> mpsc (bounded) ──> RegistryWorker (owns HashMap)
//! ControlDispatcher ──get────────┘                             │
//!        ▲                                                     │
//!        └──────────────── oneshot reply ──────────────────────┘
//! ```
//!
//! Exactly one worker task owns the map, so no lock guards it. `insert` and
//! `delete` are fire-and-forget; `get` waits for the reply up to the configured
//! lookup timeout and reports [`RegistryError::Timeout`] separately from a miss.

mod actor;
mod connection;
mod messages;

pub use actor::{spawn_registry, RegistryError, RegistryHandle};
pub use connection::{ConnectionHandle, ConnectionId};
pub use messages::RegistryCommand;

use aircat_core::{DeviceId, Frame};

/// The registry value for one device.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub device_id: DeviceId,
    pub connection: ConnectionHandle,
    /// Frame the session registered with; control frames echo its header.
    pub template: Frame,
}

impl RegistryEntry {
    pub fn new(connection: ConnectionHandle, template: Frame) -> Self {
        Self {
            device_id: template.device_id(),
            connection,
            template,
        }
    }
}
