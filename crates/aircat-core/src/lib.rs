//! Core shared types for aircat
//!
//! Device identity and the device wire protocol. Everything here is pure and
//! does no I/O, so it can be shared by the gateway and by tooling.

pub mod device;
pub mod frame;

pub use device::{DeviceId, DeviceIdError};
pub use frame::{Frame, FrameError, HEADER_LEN, IDENTITY_LEN, SIZE_MAX, SIZE_MIN};
