//! TCP listener for device connections.
//!
//! # Example
//!
//! ```no_run
//! use dm_gateway::transport::DeviceListener;
//!
//! # async fn run() -> dm_gateway::error::Result<()> {
//! let listener = DeviceListener::bind("0.0.0.0:20200".parse().unwrap()).await?;
//! let (stream, peer) = listener.accept().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;

/// Connected device socket.
pub type DeviceStream = TcpStream;

/// Listener accepting device connections.
pub struct DeviceListener {
    listener: TcpListener,
}

impl DeviceListener {
    /// Bind to `addr`. Port `0` picks a free port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept the next connection.
    ///
    /// Replies are small and latency-sensitive, so Nagle is turned off.
    pub async fn accept(&self) -> Result<(DeviceStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, "set_nodelay failed: {}", e);
        }
        Ok((stream, peer))
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
