//! Gateway configuration.
//!
//! [`GatewayConfig`] is an immutable value handed to the server at startup and
//! shared read-only with every connection. [`Cli`] maps command-line flags and
//! environment variables onto it for the binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::error::{GatewayError, Result};
use crate::forward::DEFAULT_FORWARD_TIMEOUT;
use crate::protocol::{OverflowPolicy, DEFAULT_MAX_BUFFERED, HEADER_SIZE};

/// Default device port.
pub const DEFAULT_PORT: u16 = 20200;

/// Default Traccar OsmAnd endpoint.
pub const DEFAULT_TRACCAR_URL: &str = "http://localhost:5055";

/// Default idle timeout before a silent connection is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default socket read size.
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// Runtime settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address devices connect to.
    pub listen_addr: SocketAddr,
    /// Traccar OsmAnd endpoint.
    pub traccar_url: String,
    /// Whether positions are forwarded at all.
    pub forward_enabled: bool,
    /// Per-request forwarding timeout.
    pub forward_timeout: Duration,
    /// Connection is closed after this long without inbound bytes.
    pub idle_timeout: Duration,
    /// Bytes requested per socket read.
    pub read_buffer_size: usize,
    /// Largest frame a connection will buffer.
    pub max_buffered_bytes: usize,
    /// What to do with frames above `max_buffered_bytes`.
    pub overflow_policy: OverflowPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            traccar_url: DEFAULT_TRACCAR_URL.to_string(),
            forward_enabled: true,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
            overflow_policy: OverflowPolicy::Disconnect,
        }
    }
}

impl GatewayConfig {
    /// Check values that would make the gateway unusable.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(GatewayError::Config("read buffer size must be non-zero".into()));
        }
        if self.max_buffered_bytes < HEADER_SIZE {
            return Err(GatewayError::Config(format!(
                "max buffered bytes {} is smaller than a frame header",
                self.max_buffered_bytes
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(GatewayError::Config("idle timeout must be non-zero".into()));
        }
        if self.forward_enabled && self.traccar_url.is_empty() {
            return Err(GatewayError::Config("forwarding enabled without a URL".into()));
        }
        Ok(())
    }
}

/// Overflow policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowArg {
    /// Close the connection.
    Disconnect,
    /// Drop the oversized frame and resynchronize.
    Discard,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Disconnect => OverflowPolicy::Disconnect,
            OverflowArg::Discard => OverflowPolicy::Discard,
        }
    }
}

/// Command-line interface of the gateway binary.
#[derive(Debug, Parser)]
#[command(name = "dm-gateway", version)]
#[command(about = "Digital Matter device gateway forwarding positions to Traccar")]
pub struct Cli {
    /// TCP port devices connect to
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Traccar OsmAnd endpoint
    #[arg(long, env = "TRACCAR_URL", default_value = DEFAULT_TRACCAR_URL)]
    pub traccar_url: String,

    /// Forward positions to Traccar
    #[arg(long, env = "TRACCAR_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub traccar_enabled: bool,

    /// Seconds before a silent connection is closed
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs())]
    pub idle_timeout_secs: u64,

    /// Seconds before a forwarding request is abandoned
    #[arg(long, env = "FORWARD_TIMEOUT_SECS", default_value_t = DEFAULT_FORWARD_TIMEOUT.as_secs())]
    pub forward_timeout_secs: u64,

    /// Bytes requested per socket read
    #[arg(long, env = "READ_BUFFER_BYTES", default_value_t = DEFAULT_READ_BUFFER)]
    pub read_buffer_bytes: usize,

    /// Largest frame buffered per connection
    #[arg(long, env = "MAX_BUFFERED_BYTES", default_value_t = DEFAULT_MAX_BUFFERED)]
    pub max_buffered_bytes: usize,

    /// Action when a device announces a larger frame
    #[arg(long, env = "OVERFLOW_POLICY", value_enum, default_value_t = OverflowArg::Disconnect)]
    pub overflow_policy: OverflowArg,
}

impl Cli {
    /// Turn parsed arguments into a validated configuration.
    pub fn into_config(self) -> Result<GatewayConfig> {
        let config = GatewayConfig {
            listen_addr: SocketAddr::new(self.bind, self.port),
            traccar_url: self.traccar_url,
            forward_enabled: self.traccar_enabled,
            forward_timeout: Duration::from_secs(self.forward_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            read_buffer_size: self.read_buffer_bytes,
            max_buffered_bytes: self.max_buffered_bytes,
            overflow_policy: self.overflow_policy.into(),
        };
        config.validate()?;
        Ok(config)
    }
}
