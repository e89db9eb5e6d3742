//! Session module - per-connection protocol state.
//!
//! A [`Session`] owns the connection's [`FrameBuffer`] and [`DeviceIdentity`].
//! Every chunk read from the socket goes through [`Session::ingest`], which
//! returns the replies to write, the decoded records, and the position reports
//! to forward, all in frame arrival order.
//!
//! [`serve_connection`] drives a session over a socket.

mod connection;

pub use connection::serve_connection;

use chrono::{DateTime, Utc};

use crate::codec::{decode_records, extract_identity, DataRecord, DeviceIdentity};
use crate::error::Result;
use crate::forward::PositionReport;
use crate::protocol::{
    encode_response, Frame, FrameBuffer, MessageType, OverflowPolicy, DEFAULT_MAX_BUFFERED,
};

/// Output of one [`Session::ingest`] call.
#[derive(Debug, Default)]
pub struct Ingested {
    /// Replies to write, in trigger order.
    pub responses: Vec<Frame>,
    /// Records decoded from `DATA_RECORDS` frames.
    pub records: Vec<DataRecord>,
    /// Valid positions ready for forwarding.
    pub reports: Vec<PositionReport>,
}

impl Ingested {
    /// True when the chunk completed no frame that produced output.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty() && self.records.is_empty() && self.reports.is_empty()
    }
}

/// Protocol state for one device connection.
#[derive(Debug)]
pub struct Session {
    buffer: FrameBuffer,
    identity: DeviceIdentity,
    frames: u64,
}

impl Session {
    /// Create a session with the default buffer cap.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BUFFERED, OverflowPolicy::default())
    }

    /// Create a session with a custom buffer cap and overflow policy.
    pub fn with_limit(max_buffered: usize, policy: OverflowPolicy) -> Self {
        Self {
            buffer: FrameBuffer::with_limit(max_buffered, policy),
            identity: DeviceIdentity::new(),
            frames: 0,
        }
    }

    /// Feed one chunk of socket bytes through the session.
    ///
    /// `now` stamps any `HELLO_RESPONSE` produced by this chunk.
    ///
    /// # Errors
    ///
    /// Only buffer overflow under the disconnect policy. Malformed frame
    /// content is never an error.
    pub fn ingest(&mut self, chunk: &[u8], now: DateTime<Utc>) -> Result<Ingested> {
        let mut out = Ingested::default();

        for frame in self.buffer.push(chunk)? {
            self.handle_frame(&frame, now, &mut out);
        }

        Ok(out)
    }

    /// Process one complete frame.
    pub fn handle_frame(&mut self, frame: &Frame, now: DateTime<Utc>, out: &mut Ingested) {
        self.frames += 1;

        match frame.message_type() {
            Some(MessageType::Hello) => {
                if self.identity.observe(extract_identity(frame)) {
                    tracing::info!(imei = self.identity.get(), "Connection from IMEI");
                }
            }
            Some(MessageType::DataRecords) => self.handle_records(frame, out),
            Some(MessageType::Version) => {
                tracing::debug!(len = frame.payload.len(), "version frame");
            }
            Some(MessageType::SocketClose) => tracing::debug!("device requested socket close"),
            Some(ty) => tracing::debug!(?ty, "frame"),
            None => tracing::debug!(msg_type = frame.msg_type(), "unknown frame type, skipped"),
        }

        if let Some(ty) = frame.message_type() {
            out.responses.extend(encode_response(ty, now));
        }
    }

    fn handle_records(&self, frame: &Frame, out: &mut Ingested) {
        let records = decode_records(frame.payload());
        tracing::debug!(count = records.len(), "data records");

        for record in &records {
            let Some(gps) = record.gps.filter(|g| g.valid) else {
                continue;
            };
            tracing::debug!(
                lat = gps.latitude,
                lon = gps.longitude,
                ts = record.timestamp,
                "Got GPS data"
            );

            match self.identity.get() {
                Some(id) => out.reports.extend(PositionReport::from_record(id, record)),
                None => tracing::debug!("position before HELLO, not forwarded"),
            }
        }

        out.records.extend(records);
    }

    /// Device identity, once a `HELLO` has carried one.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get()
    }

    /// Bytes retained for the next chunk.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Complete frames processed so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
