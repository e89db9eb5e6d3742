//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` so the payload shares the receive buffer.
//!
//! # Example
//!
//! ```
//! use dm_gateway::protocol::{Frame, Header, MessageType};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Header::new(0x05, 0), Bytes::new());
//! assert_eq!(frame.message_type(), Some(MessageType::CommitRequest));
//! ```

use bytes::Bytes;

use super::wire_format::{Header, MessageType, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Split a complete wire frame into header and payload.
    ///
    /// Returns `None` if `raw` is not exactly one well-formed frame.
    pub fn from_wire(mut raw: Bytes) -> Option<Self> {
        let header = Header::decode(&raw)?;
        if raw.len() != header.frame_len() {
            return None;
        }
        let payload = raw.split_off(HEADER_SIZE);
        Some(Self { header, payload })
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Raw message type byte.
    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.header.msg_type
    }

    /// Known message type, if recognized.
    #[inline]
    pub fn message_type(&self) -> Option<MessageType> {
        self.header.message_type()
    }

    /// Length of the frame on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Re-encode the frame as contiguous wire bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        build_frame(self.header.msg_type, &self.payload)
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Panics
///
/// Panics if `payload` is longer than a 16-bit length prefix can express.
///
/// # Example
///
/// ```
/// use dm_gateway::protocol::build_frame;
///
/// let bytes = build_frame(0x06, &[0x01]);
/// assert_eq!(bytes, [0x02, 0x55, 0x06, 0x01, 0x00, 0x01]);
/// ```
pub fn build_frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = u16::try_from(payload.len()).expect("payload exceeds u16 length prefix");
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&Header::new(msg_type, length).encode());
    buf.extend_from_slice(payload);
    buf
}
