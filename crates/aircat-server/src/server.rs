//! Device listener
//!
//! Accepts device TCP connections and runs one [`DeviceSession`] task per
//! connection. Only binding the listener can fail; accept errors are logged
//! and the loop keeps going.

use crate::registry::ConnectionHandle;
use crate::session::{DeviceSession, SessionContext};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct DeviceServer {
    listener: TcpListener,
    ctx: SessionContext,
    advertise_addr: Option<String>,
}

impl DeviceServer {
    pub async fn bind(
        addr: SocketAddr,
        ctx: SessionContext,
        advertise_addr: Option<String>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Device listener bound");
        Ok(Self {
            listener,
            ctx,
            advertise_addr,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.spawn_session(stream, peer),
                Err(e) => {
                    warn!(error = %e, "Failed to accept device connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let node_addr = match &self.advertise_addr {
            Some(addr) => addr.clone(),
            // The interface the device reached us on, without the port
            None => match stream.local_addr() {
                Ok(local) => local.ip().to_string(),
                Err(e) => {
                    warn!(
                        peer = %peer,
                        error = %e,
                        "Cannot resolve local address, dropping connection"
                    );
                    return;
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let connection = ConnectionHandle::new(peer, writer);
        let session = DeviceSession::new(reader, connection, node_addr, self.ctx.clone());

        tokio::spawn(async move {
            let report = session.run().await;
            debug!(
                peer = %peer,
                device_id = ?report.device_id,
                frames_decoded = report.frames_decoded,
                frames_dropped = report.frames_dropped,
                "Session ended"
            );
        });
    }
}
