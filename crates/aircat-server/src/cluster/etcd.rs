//! Etcd-backed cluster directory
//!
//! Each device is stored under `/aircat/v1/devices/{device_id}` with the owning
//! node's address as a plain string value.

use super::{ClusterDirectory, DirectoryError};
use crate::config::ClusterConfig;
use aircat_core::DeviceId;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use etcd_client::{Client, ConnectOptions};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEVICES_PREFIX: &str = "/aircat/v1/devices/";

pub struct EtcdDirectory {
    endpoints: Vec<String>,
    options: ConnectOptions,
    client: RwLock<Option<Client>>,
    /// Held by the one caller reconnecting; records the last failed attempt
    reconnect: Mutex<Option<Instant>>,
    /// Minimum spacing between reconnect attempts
    cool_down: Duration,
}

impl EtcdDirectory {
    /// Connect with exponential backoff.
    ///
    /// If etcd stays unreachable the directory is still returned; operations
    /// then fail with `Unreachable` while a reconnect is attempted at most once
    /// per cool-down.
    pub async fn connect(config: &ClusterConfig) -> Self {
        let directory = Self::disconnected(config);
        let options = directory.options.clone();

        let backoff = ExponentialBackoff {
            initial_interval: config.etcd_backoff_initial,
            max_interval: config.etcd_backoff_max,
            max_elapsed_time: Some(config.etcd_backoff_max_elapsed),
            ..Default::default()
        };

        let endpoints = config.etcd_endpoints.clone();
        let connected = retry(backoff, || async {
            match Client::connect(&endpoints, Some(options.clone())).await {
                Ok(client) => Ok(client),
                Err(e) => {
                    warn!(error = %e, "etcd connection failed, retrying");
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await;

        match connected {
            Ok(client) => {
                info!(endpoints = ?config.etcd_endpoints, "Connected to etcd");
                *directory.client.write().await = Some(client);
            }
            Err(e) => {
                warn!(
                    endpoints = ?config.etcd_endpoints,
                    error = %e,
                    "etcd unreachable, cluster redirects degraded until it recovers"
                );
                *directory.reconnect.lock().await = Some(Instant::now());
            }
        }
        directory
    }

    fn disconnected(config: &ClusterConfig) -> Self {
        Self {
            endpoints: config.etcd_endpoints.clone(),
            options: ConnectOptions::new()
                .with_connect_timeout(config.etcd_timeout)
                .with_timeout(config.etcd_timeout),
            client: RwLock::new(None),
            reconnect: Mutex::new(None),
            cool_down: config.etcd_backoff_initial,
        }
    }

    fn key(device_id: &DeviceId) -> String {
        format!("{DEVICES_PREFIX}{device_id}")
    }

    async fn connected(&self) -> Option<Client> {
        self.client.read().await.clone()
    }

    /// Current client, reconnecting if there is none.
    ///
    /// Only one caller reconnects at a time. Others, and any caller within the
    /// cool-down after a failed attempt, get `Unreachable` without waiting.
    async fn client(&self) -> Result<Client, DirectoryError> {
        if let Some(client) = self.connected().await {
            return Ok(client);
        }

        let Ok(mut last_failure) = self.reconnect.try_lock() else {
            return Err(DirectoryError::Unreachable("reconnect in progress".into()));
        };
        // Another caller may have reconnected while we took the lock
        if let Some(client) = self.connected().await {
            return Ok(client);
        }
        if let Some(at) = *last_failure {
            if at.elapsed() < self.cool_down {
                return Err(DirectoryError::Unreachable(
                    "waiting before next reconnect".into(),
                ));
            }
        }

        match Client::connect(&self.endpoints, Some(self.options.clone())).await {
            Ok(client) => {
                debug!("Reconnected to etcd");
                *self.client.write().await = Some(client.clone());
                *last_failure = None;
                Ok(client)
            }
            Err(e) => {
                *last_failure = Some(Instant::now());
                Err(DirectoryError::Unreachable(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl ClusterDirectory for EtcdDirectory {
    async fn lookup(&self, device_id: &DeviceId) -> Result<Option<String>, DirectoryError> {
        let mut client = self.client().await?;
        let resp = client.get(Self::key(device_id), None).await?;

        match resp.kvs().first() {
            Some(kv) => Ok(Some(kv.value_str()?.to_string())),
            None => Ok(None),
        }
    }

    async fn upsert(&self, device_id: &DeviceId, node_addr: &str) -> Result<(), DirectoryError> {
        let mut client = self.client().await?;
        client.put(Self::key(device_id), node_addr, None).await?;
        debug!(device_id = %device_id, node_addr = %node_addr, "Published device location");
        Ok(())
    }
}
