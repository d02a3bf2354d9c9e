//! Test doubles shared by the unit tests.

use crate::cluster::{ClusterDirectory, DirectoryError};
use aircat_core::DeviceId;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-process directory that counts lookups.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: Mutex<HashMap<DeviceId, String>>,
    lookups: AtomicUsize,
    upserts: AtomicUsize,
    unreachable: bool,
    stalled: bool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory whose every call fails as if etcd were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// A directory whose calls never complete, like etcd behind a blackholed route.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn with_entry(self, device_id: &DeviceId, node_addr: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(device_id.clone(), node_addr.to_string());
        self
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<String> {
        self.entries.lock().unwrap().get(device_id).cloned()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Upserts started, including ones still pending
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    async fn available(&self) -> Result<(), DirectoryError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        if self.unreachable {
            return Err(DirectoryError::Unreachable("test directory down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterDirectory for MemoryDirectory {
    async fn lookup(&self, device_id: &DeviceId) -> Result<Option<String>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.available().await?;
        Ok(self.get(device_id))
    }

    async fn upsert(&self, device_id: &DeviceId, node_addr: &str) -> Result<(), DirectoryError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.available().await?;
        self.entries
            .lock()
            .unwrap()
            .insert(device_id.clone(), node_addr.to_string());
        Ok(())
    }
}

/// One request seen by a [`PeerNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedRequest {
    pub device_id: String,
    pub body: String,
}

/// Stand-in for a peer node's relay ingress on an ephemeral port.
pub struct PeerNode {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RelayedRequest>>>,
}

impl PeerNode {
    /// Serve `POST /v1/aircat/{id}`, answering every request with `status`.
    pub async fn start(status: StatusCode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/v1/aircat/{id}", post(record))
            .with_state((requests.clone(), status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn requests(&self) -> Vec<RelayedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

type PeerState = (Arc<Mutex<Vec<RelayedRequest>>>, StatusCode);

async fn record(
    State((requests, status)): State<PeerState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    requests.lock().unwrap().push(RelayedRequest {
        device_id,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    status
}
