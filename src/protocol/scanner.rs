//! Frame boundary scanner.
//!
//! Finds the next complete frame in an accumulated buffer. Bytes that do not
//! start a sync marker are stepped over one at a time, so a stream with stray
//! or misaligned bytes realigns on the next `02 55` instead of failing.

use super::wire_format::{Header, SYNC};

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete frame occupies `buf[start..end]`.
    Frame {
        /// Offset of the sync marker.
        start: usize,
        /// One past the last payload byte.
        end: usize,
    },
    /// No complete frame yet. Bytes before `resume` can be discarded.
    NeedMore {
        /// Where the next scan must begin once more bytes arrive.
        resume: usize,
    },
}

impl Scan {
    /// Number of bytes stepped over before the frame or resume point.
    pub fn skipped(&self, cursor: usize) -> usize {
        match *self {
            Scan::Frame { start, .. } => start - cursor,
            Scan::NeedMore { resume } => resume - cursor,
        }
    }
}

/// Locate the next complete frame at or after `cursor`.
///
/// Never fails: malformed input costs at most one pass over the buffer.
///
/// # Example
///
/// ```
/// use dm_gateway::protocol::{scan, Scan};
///
/// let buf = [0xFF, 0x02, 0x55, 0x05, 0x00, 0x00];
/// assert_eq!(scan(&buf, 0), Scan::Frame { start: 1, end: 6 });
/// assert_eq!(scan(&buf[..4], 0), Scan::NeedMore { resume: 1 });
/// ```
pub fn scan(buf: &[u8], cursor: usize) -> Scan {
    let mut offset = cursor;

    while buf.len().saturating_sub(offset) >= SYNC.len() {
        if buf[offset..offset + SYNC.len()] != SYNC {
            offset += 1;
            continue;
        }

        let Some(header) = Header::decode(&buf[offset..]) else {
            // Marker found but the length field has not arrived yet
            return Scan::NeedMore { resume: offset };
        };

        let end = offset + header.frame_len();
        if end > buf.len() {
            return Scan::NeedMore { resume: offset };
        }
        return Scan::Frame { start: offset, end };
    }

    Scan::NeedMore {
        resume: offset.min(buf.len()),
    }
}
