//! Bounded directory publishing
//!
//! Sessions hand their registration to [`DirectoryPublisher::publish`], which
//! never waits. One task drains the queue and upserts entries in order, so a
//! slow or unreachable directory holds at most `publish_queue` pending entries.

use super::ClusterDirectory;
use crate::observability::events;
use aircat_core::DeviceId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
struct Publication {
    device_id: DeviceId,
    node_addr: String,
}

/// Cloneable submission side of the publish queue.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    tx: mpsc::Sender<Publication>,
}

impl DirectoryPublisher {
    /// Queue an upsert of `device_id -> node_addr`. Returns `false` if it was dropped.
    pub fn publish(&self, device_id: &DeviceId, node_addr: &str) -> bool {
        let publication = Publication {
            device_id: device_id.clone(),
            node_addr: node_addr.to_string(),
        };

        let (p, reason) = match self.tx.try_send(publication) {
            Ok(()) => return true,
            Err(TrySendError::Full(p)) => (p, "publish queue full"),
            Err(TrySendError::Closed(p)) => (p, "publisher stopped"),
        };
        events::directory_upsert_failed(p.device_id.as_str(), &p.node_addr, reason);
        false
    }
}

/// Start the publisher task for `directory`.
pub fn spawn_publisher(
    directory: Arc<dyn ClusterDirectory>,
    capacity: usize,
) -> (DirectoryPublisher, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run_publisher(directory, rx));
    (DirectoryPublisher { tx }, task)
}

async fn run_publisher(directory: Arc<dyn ClusterDirectory>, mut rx: mpsc::Receiver<Publication>) {
    while let Some(p) = rx.recv().await {
        if let Err(e) = directory.upsert(&p.device_id, &p.node_addr).await {
            events::directory_upsert_failed(p.device_id.as_str(), &p.node_addr, &e.to_string());
        }
    }
    debug!("Directory publisher stopped");
}
