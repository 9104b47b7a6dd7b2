use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::FrameError;

/// Upper bound on how much buffer space a single decode call reserves while
/// waiting for a payload. A peer announcing a huge length has to actually
/// deliver the bytes before we grow further.
const MAX_RESERVE_CHUNK: usize = 64 * 1024;

/// Tokio codec for length-prefixed JSON frames.
///
/// Bytes are consumed from the read buffer exactly once: the length prefix is
/// split off as soon as it is complete and cached until the payload arrives, so
/// many tiny deliveries never cause the buffer to be rescanned.
#[derive(Debug)]
pub struct FrameCodec {
    /// Payload length from a prefix already consumed from the buffer.
    current_len: Option<u32>,
    /// Configured maximum payload size (enforced on both encode and decode).
    max_payload_size: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload_size(MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with a custom maximum payload size.
    pub fn with_max_payload_size(max_payload_size: u32) -> Self {
        Self {
            current_len: None,
            max_payload_size,
        }
    }

    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    /// True while a length prefix has been consumed but its payload has not.
    pub fn is_mid_frame(&self) -> bool {
        self.current_len.is_some()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.current_len.take() {
            Some(len) => len,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let len = src.get_u32();
                if len > self.max_payload_size {
                    return Err(FrameError::PayloadTooLarge {
                        size: u64::from(len),
                        max: self.max_payload_size,
                    });
                }
                len
            }
        };

        let payload_len = len as usize;
        if src.len() < payload_len {
            let missing = payload_len - src.len();
            src.reserve(missing.min(MAX_RESERVE_CHUNK));
            self.current_len = Some(len);
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();
        Ok(Some(Frame::new(payload)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = frame.payload.len();
        if len > self.max_payload_size as usize {
            return Err(FrameError::PayloadTooLarge {
                size: len as u64,
                max: self.max_payload_size,
            });
        }

        dst.reserve(HEADER_SIZE + len);
        dst.put_u32(len as u32);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}
