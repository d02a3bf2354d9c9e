//! Registry worker and its client handle.

use super::connection::ConnectionId;
use super::messages::RegistryCommand;
use super::RegistryEntry;
use crate::config::RegistryConfig;
use crate::observability::metrics;
use aircat_core::DeviceId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The worker did not answer in time. Signals overload, not absence.
    #[error("registry lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("registry is shut down")]
    Closed,
}

/// Start the registry worker.
pub fn spawn_registry(config: &RegistryConfig) -> (RegistryHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.capacity.max(1));
    let worker = RegistryWorker {
        entries: HashMap::new(),
        rx,
    };
    let task = tokio::spawn(worker.run());

    info!(
        capacity = config.capacity,
        lookup_timeout_ms = config.lookup_timeout.as_millis() as u64,
        "Connection registry started"
    );

    (RegistryHandle::from_sender(tx, config.lookup_timeout), task)
}

struct RegistryWorker {
    entries: HashMap<DeviceId, RegistryEntry>,
    rx: mpsc::Receiver<RegistryCommand>,
}

impl RegistryWorker {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                RegistryCommand::Insert { entry } => self.insert(entry),
                RegistryCommand::Delete {
                    device_id,
                    connection,
                } => self.delete(&device_id, connection),
                RegistryCommand::Get { device_id, reply } => {
                    let entry = self.entries.get(&device_id).cloned();
                    trace!(device_id = %device_id, hit = entry.is_some(), "Registry get");
                    // Caller may have timed out and dropped the receiver
                    let _ = reply.send(entry);
                }
                RegistryCommand::Shutdown => break,
            }
        }

        // Dropping the receiver fails any queued requests
        debug!(entries = self.entries.len(), "Registry worker stopped");
    }

    fn insert(&mut self, entry: RegistryEntry) {
        let device_id = entry.device_id.clone();
        let connection = entry.connection.id();
        if let Some(previous) = self.entries.insert(device_id.clone(), entry) {
            if previous.connection.id() != connection {
                debug!(
                    device_id = %device_id,
                    previous = %previous.connection.id(),
                    current = %connection,
                    "Replaced stale registry entry"
                );
            }
        }
        metrics::set_registry_entries(self.entries.len());
    }

    fn delete(&mut self, device_id: &DeviceId, connection: ConnectionId) {
        match self.entries.get(device_id) {
            Some(entry) if entry.connection.id() == connection => {
                self.entries.remove(device_id);
                metrics::set_registry_entries(self.entries.len());
            }
            Some(entry) => {
                debug!(
                    device_id = %device_id,
                    owner = %entry.connection.id(),
                    requested_by = %connection,
                    "Ignoring delete from superseded connection"
                );
            }
            None => {}
        }
    }
}

/// Cloneable client for the registry worker.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
    lookup_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl RegistryHandle {
    fn from_sender(tx: mpsc::Sender<RegistryCommand>, lookup_timeout: Duration) -> Self {
        Self {
            tx,
            lookup_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle whose queue is never drained, for exercising timeouts.
    #[cfg(test)]
    pub(crate) fn detached(
        capacity: usize,
        lookup_timeout: Duration,
    ) -> (Self, mpsc::Receiver<RegistryCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::from_sender(tx, lookup_timeout), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Insert or replace the entry for `entry.device_id`.
    pub async fn insert(&self, entry: RegistryEntry) -> Result<(), RegistryError> {
        self.submit(RegistryCommand::Insert { entry }).await
    }

    /// Remove the device's entry if `connection` still owns it.
    pub async fn delete(
        &self,
        device_id: DeviceId,
        connection: ConnectionId,
    ) -> Result<(), RegistryError> {
        self.submit(RegistryCommand::Delete {
            device_id,
            connection,
        })
        .await
    }

    /// Look up a device. `Ok(None)` is a miss.
    pub async fn get(&self, device_id: &DeviceId) -> Result<Option<RegistryEntry>, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }

        let started = Instant::now();
        let (reply, rx) = oneshot::channel();
        let command = RegistryCommand::Get {
            device_id: device_id.clone(),
            reply,
        };

        let result = tokio::time::timeout(self.lookup_timeout, async {
            self.tx
                .send(command)
                .await
                .map_err(|_| RegistryError::Closed)?;
            rx.await.map_err(|_| RegistryError::Closed)
        })
        .await;

        metrics::record_registry_lookup(started.elapsed());

        match result {
            Ok(reply) => reply,
            Err(_) => Err(RegistryError::Timeout(self.lookup_timeout)),
        }
    }

    /// Stop the worker. Later commands from any clone fail with `Closed`.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        let result = self.submit(RegistryCommand::Shutdown).await;
        self.closed.store(true, Ordering::Release);
        result
    }

    async fn submit(&self, command: RegistryCommand) -> Result<(), RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }
        self.tx
            .send(command)
            .await
            .map_err(|_| RegistryError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionHandle, RegistryEntry};
    use aircat_core::Frame;

    fn entry(tail: u8) -> (RegistryEntry, tokio::io::DuplexStream) {
        let (local, remote) = tokio::io::duplex(256);
        let connection = ConnectionHandle::new("10.0.0.9:40000".parse().unwrap(), local);
        let template = Frame::new(2, [1, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, tail, 0], "{}");
        (RegistryEntry::new(connection, template), remote)
    }

    #[tokio::test]
    async fn test_insert_then_get_returns_entry() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let (inserted, _peer) = entry(0xff);
        let device_id = inserted.device_id.clone();

        registry.insert(inserted.clone()).await.unwrap();
        let found = registry.get(&device_id).await.unwrap().unwrap();

        assert_eq!(found.device_id.as_str(), "aabbccddeeff");
        assert_eq!(found.connection.id(), inserted.connection.id());
        assert_eq!(found.template, inserted.template);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_miss() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let (inserted, _peer) = entry(0x01);
        let device_id = inserted.device_id.clone();
        let connection = inserted.connection.id();

        registry.insert(inserted).await.unwrap();
        registry.delete(device_id.clone(), connection).await.unwrap();

        assert!(registry.get(&device_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_is_miss() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let device_id = DeviceId::parse("000000000000").unwrap();
        assert_eq!(registry.get(&device_id).await.map(|e| e.is_none()), Ok(true));
    }

    #[tokio::test]
    async fn test_last_insert_wins_and_stale_delete_is_ignored() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let (old, _old_peer) = entry(0x02);
        let (new, _new_peer) = entry(0x02);
        let device_id = old.device_id.clone();
        let old_connection = old.connection.id();
        let new_connection = new.connection.id();

        registry.insert(old).await.unwrap();
        registry.insert(new).await.unwrap();
        registry
            .delete(device_id.clone(), old_connection)
            .await
            .unwrap();

        let found = registry.get(&device_id).await.unwrap().unwrap();
        assert_eq!(found.connection.id(), new_connection);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_converge() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let mut tasks = Vec::new();

        for i in 0..64u8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (entry, peer) = entry(i);
                let device_id = entry.device_id.clone();
                let connection = entry.connection.id();
                registry.insert(entry).await.unwrap();
                // Interleave lookups with other sessions' writes
                assert!(registry.get(&device_id).await.unwrap().is_some());
                if i % 2 == 0 {
                    registry.delete(device_id.clone(), connection).await.unwrap();
                }
                (device_id, i % 2 == 0, peer)
            }));
        }

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        for (device_id, deleted, _peer) in &outcomes {
            let found = registry.get(device_id).await.unwrap();
            assert_eq!(found.is_none(), *deleted, "device {device_id}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_worker_times_out_at_bound() {
        let (registry, _rx) = RegistryHandle::detached(16, Duration::from_millis(500));
        let device_id = DeviceId::parse("aabbccddeeff").unwrap();

        let started = tokio::time::Instant::now();
        let result = registry.get(&device_id).await;
        let elapsed = started.elapsed();

        assert_eq!(
            result.err(),
            Some(RegistryError::Timeout(Duration::from_millis(500)))
        );
        assert!(elapsed >= Duration::from_millis(500), "fired early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(550), "fired late: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_times_out() {
        let (registry, _rx) = RegistryHandle::detached(1, Duration::from_millis(500));
        let device_id = DeviceId::parse("aabbccddeeff").unwrap();
        let (filler, _peer) = entry(0x03);
        registry.insert(filler).await.unwrap();

        assert!(matches!(
            registry.get(&device_id).await,
            Err(RegistryError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail_fast() {
        let (registry, task) = spawn_registry(&RegistryConfig::default());
        let clone = registry.clone();
        registry.shutdown().await.unwrap();
        task.await.unwrap();

        let device_id = DeviceId::parse("aabbccddeeff").unwrap();
        assert_eq!(clone.get(&device_id).await.err(), Some(RegistryError::Closed));

        let (late, _peer) = entry(0x04);
        assert_eq!(clone.insert(late).await, Err(RegistryError::Closed));
        assert!(clone.is_closed());
    }
}
