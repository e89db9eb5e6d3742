//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] provides a fluent API for configuring the gateway and
//! choosing where positions go. The [`Server`] manages the lifecycle:
//! 1. Bind the device listener
//! 2. Accept connections
//! 3. Run each connection on its own task until it closes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dm_gateway::{forward::TraccarForwarder, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let forwarder = TraccarForwarder::new(
//!         "http://localhost:5055",
//!         std::time::Duration::from_secs(10),
//!     )?;
//!
//!     let server = Server::builder()
//!         .listen_addr("0.0.0.0:20200".parse()?)
//!         .sink(Arc::new(forwarder))
//!         .bind()
//!         .await?;
//!
//!     server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::forward::PositionSink;
use crate::protocol::OverflowPolicy;
use crate::session::serve_connection;
use crate::transport::DeviceListener;

/// Builder for configuring and creating a gateway server.
pub struct ServerBuilder {
    config: GatewayConfig,
    sink: Option<Arc<dyn PositionSink>>,
}

impl ServerBuilder {
    /// Create a builder with default configuration and no sink.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            sink: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the address devices connect to.
    ///
    /// Default: `0.0.0.0:20200`
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    /// Set how long a connection may stay silent.
    ///
    /// Default: 10 minutes
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the socket read size.
    ///
    /// Default: 4096
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the largest frame a connection will buffer and the overflow policy.
    pub fn max_buffered(mut self, bytes: usize, policy: OverflowPolicy) -> Self {
        self.config.max_buffered_bytes = bytes;
        self.config.overflow_policy = policy;
        self
    }

    /// Send position reports to `sink`. Without one, reports are only logged.
    pub fn sink(mut self, sink: Arc<dyn PositionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and bind the listener.
    pub async fn bind(self) -> Result<Server> {
        self.config.validate()?;
        let listener = DeviceListener::bind(self.config.listen_addr).await?;
        Ok(Server::new(listener, self.config, self.sink))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gateway server.
pub struct Server {
    listener: DeviceListener,
    config: Arc<GatewayConfig>,
    sink: Option<Arc<dyn PositionSink>>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Create a server on an already bound listener.
    pub fn new(
        listener: DeviceListener,
        config: GatewayConfig,
        sink: Option<Arc<dyn PositionSink>>,
    ) -> Self {
        Self {
            listener,
            config: Arc::new(config),
            sink,
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Stops accepting immediately; connections already running finish on
    /// their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "listening for devices");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => tracing::error!("accept error: {}", e),
                },
            }
        }
    }

    fn spawn_connection(&self, stream: crate::transport::DeviceStream, peer: SocketAddr) {
        let config = self.config.clone();
        let sink = self.sink.clone();

        // Errors are logged inside the connection span.
        tokio::spawn(async move {
            let _ = serve_connection(stream, peer, config, sink).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_configuration() {
        let builder = Server::builder()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .idle_timeout(Duration::from_secs(30))
            .read_buffer_size(512)
            .max_buffered(1024, OverflowPolicy::Discard);

        assert_eq!(builder.config.listen_addr.port(), 0);
        assert_eq!(builder.config.idle_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.read_buffer_size, 512);
        assert_eq!(builder.config.max_buffered_bytes, 1024);
        assert_eq!(builder.config.overflow_policy, OverflowPolicy::Discard);
        assert!(builder.sink.is_none());
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let result = Server::builder()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .read_buffer_size(0)
            .bind()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = Server::builder()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .bind()
            .await
            .unwrap();

        server.run_until(async {}).await.unwrap();
    }
}
