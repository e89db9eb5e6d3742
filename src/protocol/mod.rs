//! Protocol module - wire format, framing, and replies.
//!
//! This module implements the device-facing side of the protocol:
//! - 5-byte header encoding/decoding and the message type table
//! - Scanner that finds frame boundaries and resynchronizes on garbage
//! - Frame buffer for accumulating partial reads
//! - Acknowledgment frame builders

mod frame;
mod frame_buffer;
mod response;
mod scanner;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::{FrameBuffer, OverflowPolicy, DEFAULT_MAX_BUFFERED};
pub use response::{encode_response, protocol_time, COMMIT_ACCEPT, HELLO_RESPONSE_LEN};
pub use scanner::{scan, Scan};
pub use wire_format::{
    Header, MessageType, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_EPOCH, SYNC,
};
