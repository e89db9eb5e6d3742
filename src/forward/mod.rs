//! Forwarding module - handing decoded positions to the tracking platform.
//!
//! A [`PositionReport`] is built for every valid GPS reading on a connection
//! whose identity is known, then passed to a [`PositionSink`]. Submission is
//! fire-and-forget: sinks log their own failures and never report back to the
//! device connection.

mod report;
mod traccar;

pub use report::{battery_percent, normalize_bearing, PositionReport, KMH_TO_KNOTS};
pub use traccar::{OsmAndQuery, TraccarForwarder, DEFAULT_FORWARD_TIMEOUT};

/// Destination for decoded positions.
///
/// `submit` must not block; implementations that do I/O spawn it.
pub trait PositionSink: Send + Sync + 'static {
    /// Hand off one position update.
    fn submit(&self, report: PositionReport);
}
