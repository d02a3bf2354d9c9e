//! ControlDispatcher Implementation

use super::messages::{CommandOrigin, ControlCommand, DispatchError, DispatchOutcome};
use crate::cluster::{ClusterDirectory, DirectoryError, RelayClient};
use crate::observability::{events, metrics};
use crate::registry::{RegistryEntry, RegistryError, RegistryHandle};
use kameo::{
    message::{Context, Message},
    Actor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on writing one control frame to a device
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Directory and relay used when running as a cluster member.
#[derive(Clone)]
pub struct ClusterRoute {
    pub directory: Arc<dyn ClusterDirectory>,
    pub relay: RelayClient,
    /// Bound on one directory lookup
    pub lookup_timeout: Duration,
}

/// Actor resolving control commands to a device connection.
///
/// Commands are handled one at a time, so every await in here is bounded.
#[derive(Actor)]
pub struct ControlDispatcher {
    registry: RegistryHandle,
    /// None in single-node mode
    cluster: Option<ClusterRoute>,
    write_timeout: Duration,
}

impl ControlDispatcher {
    pub fn new(registry: RegistryHandle, cluster: Option<ClusterRoute>) -> Self {
        Self {
            registry,
            cluster,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Resolve and deliver one command.
    pub async fn dispatch(&self, command: &ControlCommand) -> DispatchOutcome {
        let device_id = &command.device_id;

        let outcome = match self.registry.get(device_id).await {
            Ok(Some(entry)) => self.deliver(&entry, &command.payload).await,
            Ok(None) => self.redirect(command, DispatchError::UnknownDevice).await,
            Err(RegistryError::Timeout(after)) => {
                warn!(
                    device_id = %device_id,
                    timeout_ms = after.as_millis() as u64,
                    "Registry lookup timed out"
                );
                self.redirect(command, RegistryError::Timeout(after).into())
                    .await
            }
            Err(e) => DispatchOutcome::Failed(e.into()),
        };

        metrics::record_dispatch(outcome.label());
        match &outcome {
            DispatchOutcome::Failed(e) => {
                events::command_dispatched(device_id.as_str(), "failed", Some(&e.to_string()))
            }
            DispatchOutcome::Redirected { node } => {
                debug!(device_id = %device_id, node = %node, "Command relayed to owning node");
                events::command_dispatched(device_id.as_str(), "redirected", None)
            }
            DispatchOutcome::Delivered => {
                events::command_dispatched(device_id.as_str(), "delivered", None)
            }
        }

        outcome
    }

    async fn deliver(&self, entry: &RegistryEntry, payload: &str) -> DispatchOutcome {
        let frame = match entry.template.to_control_frame(payload) {
            Ok(frame) => frame,
            Err(e) => return DispatchOutcome::Failed(e.into()),
        };

        // A broken or stalled connection is left for its session to clean up
        match entry.connection.write_frame(&frame, self.write_timeout).await {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e) => DispatchOutcome::Failed(DispatchError::ConnectionBroken(e)),
        }
    }

    /// Try the node recorded in the directory; otherwise fail with `local`.
    async fn redirect(&self, command: &ControlCommand, local: DispatchError) -> DispatchOutcome {
        let route = match &self.cluster {
            Some(route) if command.origin == CommandOrigin::Operator => route,
            _ => return DispatchOutcome::Failed(local),
        };

        let lookup = route.directory.lookup(&command.device_id);
        let node = match tokio::time::timeout(route.lookup_timeout, lookup).await {
            Ok(Ok(Some(node))) => node,
            Ok(Ok(None)) => return DispatchOutcome::Failed(DispatchError::UnknownDevice),
            Ok(Err(e)) => return DispatchOutcome::Failed(e.into()),
            Err(_) => {
                let e = DirectoryError::Unreachable(format!(
                    "lookup timed out after {}ms",
                    route.lookup_timeout.as_millis()
                ));
                return DispatchOutcome::Failed(e.into());
            }
        };

        match route
            .relay
            .forward(&node, &command.device_id, &command.payload)
            .await
        {
            Ok(()) => DispatchOutcome::Redirected { node },
            Err(e) => DispatchOutcome::Failed(e.into()),
        }
    }
}

impl Message<ControlCommand> for ControlDispatcher {
    type Reply = DispatchOutcome;

    async fn handle(
        &mut self,
        command: ControlCommand,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.dispatch(&command).await
    }
}
