//! Device wire format encoding and decoding.
//!
//! One TCP read carries one frame:
//! ```text
//! ┌──────┬──────────────────────────┬──────────────────────────────┐
//! │ Kind │ Identity                 │ Payload                      │
//! │ 1 B  │ 8 bytes                  │ UTF-8 text [+ 0xFF "#END#"]  │
//! └──────┴──────────────────────────┴──────────────────────────────┘
//! ```
//!
//! The payload is usually a JSON document. Devices terminate it with the
//! `0xFF #END#` trailer and may pad with NUL bytes; both are stripped on decode.

use crate::device::DeviceId;
use thiserror::Error;

/// Identity field size in bytes.
pub const IDENTITY_LEN: usize = 8;

/// Header size in bytes (kind + identity).
pub const HEADER_LEN: usize = 1 + IDENTITY_LEN;

/// Smallest frame accepted. A bare header is a heartbeat.
pub const SIZE_MIN: usize = HEADER_LEN;

/// Largest frame accepted.
pub const SIZE_MAX: usize = 4096;

/// Payload terminator written by devices and echoed on control frames.
pub const TRAILER: &[u8] = b"\xff#END#";

/// Frame decoding and encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Input length outside `[SIZE_MIN, SIZE_MAX]`; decode was not attempted.
    #[error("frame size {len} outside [{SIZE_MIN}, {SIZE_MAX}]")]
    SizeOutOfBounds { len: usize },

    /// Header parsed but the payload is not valid UTF-8.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Encoded control frame would not fit in a single frame.
    #[error("control payload of {len} bytes does not fit in a frame")]
    PayloadTooLarge { len: usize },
}

/// Check a read length against the frame bounds.
#[inline]
pub fn size_in_bounds(len: usize) -> bool {
    (SIZE_MIN..=SIZE_MAX).contains(&len)
}

/// A decoded device frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message-type discriminator.
    pub kind: u8,
    /// Raw identity field; bytes 1..=6 form the device id.
    pub identity: [u8; IDENTITY_LEN],
    /// Payload text with trailer and padding removed.
    pub payload: String,
}

impl Frame {
    pub fn new(kind: u8, identity: [u8; IDENTITY_LEN], payload: impl Into<String>) -> Self {
        Self {
            kind,
            identity,
            payload: payload.into(),
        }
    }

    /// Decode a frame from one read's worth of bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use aircat_core::Frame;
    ///
    /// let mut bytes = vec![0x02, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00];
    /// bytes.extend_from_slice(b"{\"value\":\"12\"}\xff#END#");
    /// let frame = Frame::decode(&bytes).unwrap();
    /// assert_eq!(frame.device_id().as_str(), "aabbccddeeff");
    /// assert_eq!(frame.payload, "{\"value\":\"12\"}");
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if !size_in_bounds(buf.len()) {
            return Err(FrameError::SizeOutOfBounds { len: buf.len() });
        }

        let kind = buf[0];
        let mut identity = [0u8; IDENTITY_LEN];
        identity.copy_from_slice(&buf[1..HEADER_LEN]);

        let mut body = &buf[HEADER_LEN..];
        if let Some(stripped) = body.strip_suffix(TRAILER) {
            body = stripped;
        }
        while let Some((&0, rest)) = body.split_last() {
            body = rest;
        }

        let payload = std::str::from_utf8(body)
            .map_err(|e| FrameError::Malformed(e.to_string()))?
            .to_string();

        Ok(Self {
            kind,
            identity,
            payload,
        })
    }

    /// Encode this frame in device wire format.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let len = HEADER_LEN + self.payload.len() + TRAILER.len();
        if len > SIZE_MAX {
            return Err(FrameError::PayloadTooLarge {
                len: self.payload.len(),
            });
        }

        let mut buf = Vec::with_capacity(len);
        buf.push(self.kind);
        buf.extend_from_slice(&self.identity);
        buf.extend_from_slice(self.payload.as_bytes());
        buf.extend_from_slice(TRAILER);
        Ok(buf)
    }

    /// Build the wire bytes of a command for the device this frame came from.
    ///
    /// The kind and identity are echoed from `self` so the device accepts the
    /// frame as addressed to it.
    pub fn to_control_frame(&self, json: &str) -> Result<Vec<u8>, FrameError> {
        Frame::new(self.kind, self.identity, json).encode()
    }

    pub fn device_id(&self) -> DeviceId {
        DeviceId::from_fixed_identity(&self.identity)
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}
