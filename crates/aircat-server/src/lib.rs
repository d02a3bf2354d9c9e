//! AirCat Gateway
//!
//! Accepts persistent TCP connections from aircat air-quality sensors,
//! records their measurements, and delivers operator commands to whichever
//! cluster node holds the device's connection.

pub mod api;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod observability;
pub mod registry;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
