//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so extracted frames share the receive allocation.
//! Each [`push`](FrameBuffer::push) appends the new chunk to the bytes retained
//! from the previous call, extracts every complete frame with [`scan`], and
//! keeps only the unconsumed tail: at most one partial frame, or a single byte
//! that might be the first half of a sync marker.
//!
//! # Example
//!
//! ```
//! use dm_gateway::protocol::{build_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let wire = build_frame(0x05, b"");
//!
//! assert!(buffer.push(&wire[..3]).unwrap().is_empty());
//! let frames = buffer.push(&wire[3..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert!(buffer.is_empty());
//! ```

use bytes::{Buf, BytesMut};

use super::scanner::{scan, Scan};
use super::wire_format::{Header, MAX_FRAME_SIZE};
use super::Frame;
use crate::error::{GatewayError, Result};

/// Default cap on bytes retained between reads (one maximum-size frame).
pub const DEFAULT_MAX_BUFFERED: usize = MAX_FRAME_SIZE;

/// What to do when a peer announces a frame larger than the buffer cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Fail the push; the session closes the connection.
    #[default]
    Disconnect,
    /// Drop the oversized frame's marker and resynchronize.
    Discard,
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Bytes retained from previous reads plus the current chunk.
    buffer: BytesMut,
    /// Largest frame the buffer will wait for.
    max_buffered: usize,
    /// Policy applied when a frame exceeds `max_buffered`.
    policy: OverflowPolicy,
    /// Bytes stepped over while resynchronizing, for diagnostics.
    skipped: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BUFFERED, OverflowPolicy::default())
    }

    /// Create a frame buffer with a custom cap and overflow policy.
    pub fn with_limit(max_buffered: usize, policy: OverflowPolicy) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            max_buffered,
            policy,
            skipped: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Frames come back in wire order. A partial frame stays buffered until a
    /// later push completes it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BufferOverflow`] under
    /// [`OverflowPolicy::Disconnect`] when the next frame announces more bytes
    /// than the cap. Frames completed ahead of it in the same push are returned
    /// first; the error surfaces on the following push.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();

        loop {
            let result = scan(&self.buffer, 0);
            self.record_skipped(result.skipped(0));

            match result {
                Scan::Frame { start, end } => {
                    if end - start > self.max_buffered {
                        if self.reject_oversized(start, end - start, &frames)? {
                            continue;
                        }
                        break;
                    }
                    self.buffer.advance(start);
                    let raw = self.buffer.split_to(end - start).freeze();
                    frames.extend(Frame::from_wire(raw));
                }
                Scan::NeedMore { resume } => {
                    self.buffer.advance(resume);
                    if let Some(header) = Header::decode(&self.buffer) {
                        if header.frame_len() > self.max_buffered {
                            if self.reject_oversized(0, header.frame_len(), &frames)? {
                                continue;
                            }
                        }
                    }
                    break;
                }
            }
        }

        Ok(frames)
    }

    /// Apply the overflow policy to a frame at `start` announcing `frame_len`.
    ///
    /// Returns `Ok(true)` when scanning should continue, `Ok(false)` when the
    /// caller should return what it has.
    fn reject_oversized(
        &mut self,
        start: usize,
        frame_len: usize,
        frames: &[Frame],
    ) -> Result<bool> {
        match self.policy {
            OverflowPolicy::Discard => {
                tracing::warn!(
                    frame_len,
                    limit = self.max_buffered,
                    "discarding oversized frame"
                );
                self.buffer.advance(start + 1);
                self.record_skipped(1);
                Ok(true)
            }
            OverflowPolicy::Disconnect if frames.is_empty() => Err(GatewayError::BufferOverflow {
                buffered: frame_len,
                limit: self.max_buffered,
            }),
            OverflowPolicy::Disconnect => Ok(false),
        }
    }

    fn record_skipped(&mut self, count: usize) {
        if count > 0 {
            tracing::trace!(count, "skipped bytes while resynchronizing");
            self.skipped += count as u64;
        }
    }

    /// Bytes retained for the next push.
    pub fn tail(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes stepped over while looking for sync markers.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
