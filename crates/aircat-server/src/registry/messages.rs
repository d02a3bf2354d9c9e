//! Registry Command Types

use super::RegistryEntry;
use super::connection::ConnectionId;
use aircat_core::DeviceId;
use tokio::sync::oneshot;

/// Commands accepted by the registry worker.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert or replace the entry for a device.
    Insert { entry: RegistryEntry },
    /// Remove the entry for a device if it still belongs to `connection`.
    Delete {
        device_id: DeviceId,
        connection: ConnectionId,
    },
    /// Look up a device; the worker answers on `reply`.
    Get {
        device_id: DeviceId,
        reply: oneshot::Sender<Option<RegistryEntry>>,
    },
    /// Stop the worker and close the queue.
    Shutdown,
}
