//! Acknowledgment frames sent back to the device.
//!
//! Replies depend only on the inbound message type (and, for `HELLO`, the
//! current time); payload content never changes what is sent.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::wire_format::{Header, MessageType, PROTOCOL_EPOCH};
use super::Frame;

/// Payload size of a `HELLO_RESPONSE`.
pub const HELLO_RESPONSE_LEN: usize = 8;

/// `COMMIT_RESPONSE` payload value accepting the commit.
pub const COMMIT_ACCEPT: u8 = 0x01;

/// Seconds since the protocol epoch, saturating at the ends of `u32`.
pub fn protocol_time(now: DateTime<Utc>) -> u32 {
    let secs = now.timestamp() - PROTOCOL_EPOCH;
    u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
}

/// Build the reply for an inbound message, if the type has one.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use dm_gateway::protocol::{encode_response, MessageType};
///
/// let reply = encode_response(MessageType::CommitRequest, Utc::now()).unwrap();
/// assert_eq!(reply.to_wire(), [0x02, 0x55, 0x06, 0x01, 0x00, 0x01]);
/// assert!(encode_response(MessageType::DataRecords, Utc::now()).is_none());
/// ```
pub fn encode_response(inbound: MessageType, now: DateTime<Utc>) -> Option<Frame> {
    let reply = inbound.reply()?;

    let payload = match reply {
        MessageType::HelloResponse => {
            let mut payload = [0u8; HELLO_RESPONSE_LEN];
            payload[0..4].copy_from_slice(&protocol_time(now).to_le_bytes());
            Bytes::copy_from_slice(&payload)
        }
        MessageType::CommitResponse => Bytes::from_static(&[COMMIT_ACCEPT]),
        _ => Bytes::new(),
    };

    let header = Header::new(reply.code(), payload.len() as u16);
    Some(Frame::new(header, payload))
}
