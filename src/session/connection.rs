//! Async loop driving one device connection.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::Instrument;

use super::Session;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::forward::PositionSink;
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Serve one device until it disconnects, goes idle, or fails.
///
/// Replies are written in the order their frames arrived. Reports go to `sink`
/// without waiting on it. The returned error, if any, only concerns this
/// connection.
pub async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    config: Arc<GatewayConfig>,
    sink: Option<Arc<dyn PositionSink>>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let span = tracing::info_span!("connection", %peer, imei = tracing::field::Empty);

    async move {
        tracing::info!("device connected");

        let (mut reader, write_half) = tokio::io::split(stream);
        let (writer, mut writer_task) = spawn_writer_task(write_half, DEFAULT_CHANNEL_CAPACITY);
        let mut session = Session::with_limit(config.max_buffered_bytes, config.overflow_policy);

        // The writer only stops early on a failed write, which ends the connection.
        let (result, finished) = tokio::select! {
            result = read_loop(&mut reader, &writer, &mut session, &config, sink.as_deref()) => {
                (result, None)
            }
            finished = &mut writer_task => (Err(GatewayError::ConnectionClosed), Some(finished)),
        };

        tracing::trace!(pending = writer.pending_count(), "draining replies");
        drop(writer);
        let finished = match finished {
            Some(finished) => finished,
            None => writer_task.await,
        };
        let flushed = finished.unwrap_or(Err(GatewayError::ConnectionClosed));

        let result = match (result, flushed) {
            (Err(GatewayError::ConnectionClosed), Err(e)) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (result, _) => result,
        };

        match &result {
            Ok(()) => tracing::info!(frames = session.frames_processed(), "device disconnected"),
            Err(GatewayError::IdleTimeout(after)) => {
                tracing::info!(?after, "closing idle connection")
            }
            Err(e) => tracing::warn!("connection error: {}", e),
        }

        result
    }
    .instrument(span)
    .await
}

async fn read_loop<R>(
    reader: &mut R,
    writer: &WriterHandle,
    session: &mut Session,
    config: &GatewayConfig,
    sink: Option<&dyn PositionSink>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; config.read_buffer_size];
    let mut identified = false;

    loop {
        let n = match tokio::time::timeout(config.idle_timeout, reader.read(&mut buf)).await {
            Err(_) => return Err(GatewayError::IdleTimeout(config.idle_timeout)),
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(GatewayError::Io(e)),
        };

        let ingested = session.ingest(&buf[..n], Utc::now())?;

        if !identified {
            if let Some(imei) = session.identity() {
                tracing::Span::current().record("imei", imei);
                identified = true;
            }
        }

        for report in ingested.reports {
            match sink {
                Some(sink) => sink.submit(report),
                None => tracing::debug!(device = %report.device_id, "forwarding disabled"),
            }
        }

        for response in ingested.responses {
            writer.send(response).await?;
        }
    }
}
