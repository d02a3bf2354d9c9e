//! Cluster Directory and Relay
//!
//! Maps each device to the node currently holding its connection and forwards
//! control payloads to that node.
//!
//! - `etcd`: [`EtcdDirectory`], the shared directory backed by etcd
//! - `publisher`: [`DirectoryPublisher`], bounded queue of pending upserts
//! - `relay`: [`RelayClient`], HTTP POST of a raw command to a peer node
//!
//! Entries are upserted by the owning node when a device registers and are
//! never removed on disconnect. A lookup can therefore return a node that no
//! longer holds the device; the relay then fails or the peer finds no local
//! connection, and the command is dropped.

mod etcd;
mod publisher;
mod relay;

pub use etcd::EtcdDirectory;
pub use publisher::{spawn_publisher, DirectoryPublisher};
pub use relay::{RelayClient, RelayError};

use aircat_core::DeviceId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cluster directory unreachable: {0}")]
    Unreachable(String),
    #[error("cluster directory error: {0}")]
    Backend(#[from] etcd_client::Error),
}

/// Distributed `DeviceId -> node address` map.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Address of the node that last claimed the device, if any.
    async fn lookup(&self, device_id: &DeviceId) -> Result<Option<String>, DirectoryError>;

    /// Claim the device for `node_addr`. Last writer wins.
    async fn upsert(&self, device_id: &DeviceId, node_addr: &str) -> Result<(), DirectoryError>;
}
