//! Error types for dm-gateway.
//!
//! Only transport-level failures live here. Malformed device input is never an
//! error: the decoders truncate the smallest affected scope and keep going.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error on the listener or a device socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error while forwarding a position.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The forwarding endpoint answered with a non-success status.
    #[error("forwarding rejected with status {status}: {body}")]
    ForwardRejected {
        /// HTTP status code returned by the platform.
        status: u16,
        /// Response body, kept for the log line.
        body: String,
    },

    /// Retained bytes for one connection exceeded the configured cap.
    #[error("Buffered {buffered} bytes, exceeding limit of {limit}")]
    BufferOverflow {
        /// Bytes retained after the last scan.
        buffered: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// No bytes arrived within the idle timeout.
    #[error("Idle timeout after {0:?}")]
    IdleTimeout(std::time::Duration),

    /// Connection closed unexpectedly (writer task gone).
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
