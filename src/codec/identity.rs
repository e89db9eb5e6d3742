//! Device identity from `HELLO` frames.
//!
//! The `HELLO` payload opens with a 4-byte serial number followed by the
//! NUL-terminated IMEI, which puts the identifier 9 bytes into the frame.

use crate::protocol::{Frame, MessageType, HEADER_SIZE};

/// Offset of the identifier from the start of the frame.
pub const IDENTITY_OFFSET: usize = 9;

/// Read the identifier from a `HELLO` frame.
///
/// Returns `None` for other message types, for frames too short to reach the
/// identifier, and when the terminator comes first.
pub fn extract_identity(frame: &Frame) -> Option<String> {
    if frame.message_type() != Some(MessageType::Hello) {
        return None;
    }

    let start = IDENTITY_OFFSET - HEADER_SIZE;
    let rest = frame.payload().get(start..)?;
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    if end == 0 {
        return None;
    }

    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Identity of the device on one connection. The first reported value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    value: Option<String>,
}

impl DeviceIdentity {
    /// Create an unknown identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `candidate` unless an identity is already set.
    ///
    /// Returns `true` when this call established the identity.
    pub fn observe(&mut self, candidate: Option<String>) -> bool {
        match (&self.value, candidate) {
            (None, Some(id)) => {
                self.value = Some(id);
                true
            }
            _ => false,
        }
    }

    /// The identity, once known.
    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether a `HELLO` has established the identity.
    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn hello(payload: &[u8]) -> Frame {
        let wire = crate::protocol::build_frame(0x00, payload);
        Frame::from_wire(Bytes::from(wire)).unwrap()
    }

    fn hello_payload(imei: &str) -> Vec<u8> {
        let mut payload = 0x0001_E240u32.to_le_bytes().to_vec();
        payload.extend(imei.as_bytes());
        payload.push(0);
        payload.extend([0xAA; 8]);
        payload
    }

    #[test]
    fn test_extract_imei() {
        let frame = hello(&hello_payload("356173060000001"));
        assert_eq!(extract_identity(&frame).as_deref(), Some("356173060000001"));
    }

    #[test]
    fn test_identifier_runs_to_end_without_terminator() {
        let mut payload = 1u32.to_le_bytes().to_vec();
        payload.extend(b"12345");
        assert_eq!(extract_identity(&hello(&payload)).as_deref(), Some("12345"));
    }

    #[test]
    fn test_frame_ending_at_offset_has_no_identity() {
        // 9-byte frame: header plus serial number only
        let frame = hello(&[1, 2, 3, 4]);
        assert_eq!(frame.wire_len(), IDENTITY_OFFSET);
        assert_eq!(extract_identity(&frame), None);
    }

    #[test]
    fn test_short_and_empty_identifier() {
        assert_eq!(extract_identity(&hello(&[1, 2])), None);
        assert_eq!(extract_identity(&hello(&[1, 2, 3, 4, 0, b'9'])), None);
    }

    #[test]
    fn test_non_hello_frame_ignored() {
        let wire = crate::protocol::build_frame(0x04, &hello_payload("999"));
        let frame = Frame::from_wire(Bytes::from(wire)).unwrap();
        assert_eq!(extract_identity(&frame), None);
    }

    #[test]
    fn test_first_identity_wins() {
        let mut identity = DeviceIdentity::new();
        assert!(!identity.is_known());

        assert!(!identity.observe(extract_identity(&hello(&[1, 2, 3, 4]))));
        assert!(!identity.is_known());

        assert!(identity.observe(extract_identity(&hello(&hello_payload("111")))));
        assert!(!identity.observe(extract_identity(&hello(&hello_payload("222")))));
        assert_eq!(identity.get(), Some("111"));
    }
}
