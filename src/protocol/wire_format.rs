//! Wire format encoding and decoding.
//!
//! Every frame, in both directions, starts with a 5-byte header:
//! ```text
//! ┌──────────┬───────┬──────────┬─────────────────┐
//! │ Sync     │ Type  │ Length   │ Payload         │
//! │ 02 55    │ 1 byte│ uint16 LE│ Length bytes    │
//! └──────────┴───────┴──────────┴─────────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian.

/// Sync marker opening every frame.
pub const SYNC: [u8; 2] = [0x02, 0x55];

/// Header size in bytes (sync + type + length).
pub const HEADER_SIZE: usize = 5;

/// Largest payload a 16-bit length prefix can declare.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Protocol epoch (2013-01-01T00:00:00Z) in Unix seconds.
pub const PROTOCOL_EPOCH: i64 = 1_356_998_400;

/// Message types known to the gateway.
///
/// The mapping from an inbound type to its acknowledgment lives in
/// [`MessageType::reply`], so supporting a new type is one arm in each table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Device introduction, carries serial and IMEI.
    Hello,
    /// Clock sync answer to `Hello`.
    HelloResponse,
    /// Batch of telemetry sub-records.
    DataRecords,
    /// Device asks the server to commit what it sent.
    CommitRequest,
    /// Answer to `CommitRequest`.
    CommitResponse,
    /// Firmware/hardware version report.
    Version,
    /// Start of a device-initiated bulk session.
    AsyncSession,
    /// Answer to `AsyncSession`.
    AsyncSessionComplete,
    /// Device is about to close the socket.
    SocketClose,
}

impl MessageType {
    /// Map a wire type code to a known message type.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Hello),
            0x01 => Some(Self::HelloResponse),
            0x04 => Some(Self::DataRecords),
            0x05 => Some(Self::CommitRequest),
            0x06 => Some(Self::CommitResponse),
            0x14 => Some(Self::Version),
            0x22 => Some(Self::AsyncSession),
            0x23 => Some(Self::AsyncSessionComplete),
            0x26 => Some(Self::SocketClose),
            _ => None,
        }
    }

    /// Wire type code.
    pub fn code(self) -> u8 {
        match self {
            Self::Hello => 0x00,
            Self::HelloResponse => 0x01,
            Self::DataRecords => 0x04,
            Self::CommitRequest => 0x05,
            Self::CommitResponse => 0x06,
            Self::Version => 0x14,
            Self::AsyncSession => 0x22,
            Self::AsyncSessionComplete => 0x23,
            Self::SocketClose => 0x26,
        }
    }

    /// The acknowledgment the gateway sends for this type, if any.
    pub fn reply(self) -> Option<Self> {
        match self {
            Self::Hello => Some(Self::HelloResponse),
            Self::CommitRequest => Some(Self::CommitResponse),
            Self::AsyncSession => Some(Self::AsyncSessionComplete),
            _ => None,
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw message type byte.
    pub msg_type: u8,
    /// Payload length in bytes.
    pub payload_length: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(msg_type: u8, payload_length: u16) -> Self {
        Self {
            msg_type,
            payload_length,
        }
    }

    /// Encode header to bytes, sync marker included.
    ///
    /// # Example
    ///
    /// ```
    /// use dm_gateway::protocol::Header;
    ///
    /// let bytes = Header::new(0x06, 1).encode();
    /// assert_eq!(bytes, [0x02, 0x55, 0x06, 0x01, 0x00]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (5 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&SYNC);
        buf[2] = self.msg_type;
        buf[3..5].copy_from_slice(&self.payload_length.to_le_bytes());
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if the buffer is too short or does not start with the
    /// sync marker.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[0..2] != SYNC {
            return None;
        }
        Some(Self {
            msg_type: buf[2],
            payload_length: u16::from_le_bytes([buf[3], buf[4]]),
        })
    }

    /// Total frame length this header announces.
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_length as usize
    }

    /// Known message type, if the code is recognized.
    #[inline]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.msg_type)
    }
}
