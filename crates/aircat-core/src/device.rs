//! Device identifiers
//!
//! A [`DeviceId`] is the 12-digit lowercase hex rendering of bytes 1..=6 of a
//! frame's identity field. It keys both the per-node connection registry and
//! the cluster directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of identity bytes that make up a device id.
const ID_BYTES: usize = 6;

/// Hex length of a rendered device id.
pub const DEVICE_ID_LEN: usize = ID_BYTES * 2;

/// Identifier of a physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

/// Rejected device id text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceIdError {
    #[error("device id must be {DEVICE_ID_LEN} characters, got {0}")]
    Length(usize),
    #[error("device id must be lowercase hex: {0:?}")]
    NotHex(String),
    #[error("identity field too short: {0} bytes")]
    IdentityTooShort(usize),
}

impl DeviceId {
    /// Derive the id from a frame identity field.
    pub fn from_identity(identity: &[u8]) -> Result<Self, DeviceIdError> {
        let bytes = identity
            .get(1..=ID_BYTES)
            .ok_or(DeviceIdError::IdentityTooShort(identity.len()))?;
        Ok(Self(hex::encode(bytes)))
    }

    pub(crate) fn from_fixed_identity(identity: &[u8; crate::frame::IDENTITY_LEN]) -> Self {
        Self(hex::encode(&identity[1..=ID_BYTES]))
    }

    /// Parse the textual form used in HTTP paths and directory keys.
    pub fn parse(s: &str) -> Result<Self, DeviceIdError> {
        if s.len() != DEVICE_ID_LEN {
            return Err(DeviceIdError::Length(s.len()));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(DeviceIdError::NotHex(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DeviceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
