use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dm_gateway::config::Cli;
use dm_gateway::forward::TraccarForwarder;
use dm_gateway::{PositionSink, Server};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Cli::parse().into_config()?;

    let sink: Option<Arc<dyn PositionSink>> = if config.forward_enabled {
        let forwarder = TraccarForwarder::new(&config.traccar_url, config.forward_timeout)?;
        tracing::info!(url = forwarder.url(), "forwarding positions to Traccar");
        Some(Arc::new(forwarder))
    } else {
        tracing::info!("Traccar forwarding disabled");
        None
    };

    let mut builder = Server::builder().config(config);
    if let Some(sink) = sink {
        builder = builder.sink(sink);
    }
    let server = builder.bind().await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}
