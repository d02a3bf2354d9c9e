//! Control Dispatcher
//!
//! Routes operator commands to the connection holding the device:
//!
//! ```text
//! PUT /v1/aircat/{id} ──tell──> ControlDispatcher
//!                                  │ registry.get
//!                                  ├─ hit ──────> write control frame ──> Delivered
//!                                  ├─ miss ─────> directory.lookup ──> relay POST ──> Redirected
//!                                  └─ timeout ──> (cluster mode only) same as miss
//! ```
//!
//! The dispatcher is a single kameo actor, so commands are handled one at a
//! time and a slow relay holds up the commands behind it for at most the relay
//! timeout. Commands that arrive through the relay ingress carry
//! [`CommandOrigin::Relayed`] and are never redirected again.

mod actor;
mod messages;

pub use actor::{ClusterRoute, ControlDispatcher};
pub use messages::{CommandOrigin, ControlCommand, DispatchError, DispatchOutcome};
