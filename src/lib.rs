//! # dm-gateway
//!
//! TCP gateway for Digital Matter tracking devices.
//!
//! Devices open a TCP connection and stream binary frames. The gateway
//! reassembles them, acknowledges the ones the protocol expects an answer to,
//! decodes GPS and battery telemetry, and republishes positions to a Traccar
//! server over the OsmAnd HTTP protocol.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): sync-marked frames, resynchronizing scanner,
//!   per-connection frame buffer, reply encoding
//! - **Codec** ([`codec`]): device identity and telemetry record decoding
//! - **Session** ([`session`]): per-connection state and the async read loop
//! - **Forwarding** ([`forward`]): position reports and the Traccar client
//!
//! ## Example
//!
//! ```no_run
//! use dm_gateway::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .listen_addr("127.0.0.1:20200".parse()?)
//!         .bind()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod forward;
pub mod protocol;
pub mod session;
pub mod transport;

mod server;
mod writer;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use forward::{PositionReport, PositionSink};
pub use server::{Server, ServerBuilder};
pub use session::Session;
