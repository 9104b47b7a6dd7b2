pub mod codec;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Length prefix size in bytes (unsigned, big-endian).
pub const HEADER_SIZE: usize = 4;

/// Default ceiling on a single frame's payload: 32 MiB.
///
/// The wire format allows up to `u32::MAX` bytes; this bounds the memory a
/// misbehaving peer can make us buffer.
pub const MAX_PAYLOAD_SIZE: u32 = 32 * 1024 * 1024;

/// A complete frame: the UTF-8 JSON payload without its length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Serialize a value into a frame payload.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self {
            payload: Bytes::from(payload),
        })
    }

    /// Deserialize the payload.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size of the frame on the wire, including the length prefix.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}
