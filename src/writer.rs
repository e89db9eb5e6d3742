//! Per-connection writer task for device replies.
//!
//! Replies are queued on an mpsc channel and written by one task that owns the
//! socket's write half. Frames queued while a write is in flight go out
//! together in a single vectored write.
//!
//! ```text
//! Session ─► WriterHandle ─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► TCP
//! ```
//!
//! Channel order is write order, so replies reach the device in the order their
//! triggering frames arrived.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};
use crate::protocol::{Frame, HEADER_SIZE};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 32;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded 5-byte header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for `ASYNC_SESSION_COMPLETE`).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

impl From<Frame> for OutboundFrame {
    fn from(frame: Frame) -> Self {
        Self {
            header: frame.header.encode(),
            payload: frame.payload,
        }
    }
}

/// Handle for queueing frames on the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    /// Frames queued but not yet written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a frame, waiting for channel capacity.
    ///
    /// Fails with [`GatewayError::ConnectionClosed`] once the writer task has
    /// stopped.
    pub async fn send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame.into()).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            GatewayError::ConnectionClosed
        })
    }

    /// Get current pending frame count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task finishes with `Ok(())` once every handle is dropped and the queue
/// is drained, or with the first write error.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };
    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
        pending.fetch_sub(batch.len(), Ordering::Release);
    }

    writer.shutdown().await.ok();
    Ok(())
}

/// Write a batch of frames using scatter/gather I/O, resuming after partial
/// writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(GatewayError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the bytes after `skip_bytes`.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.header[..], &frame.payload[..]] {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(offset)..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, Header};
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    fn commit_response() -> OutboundFrame {
        Frame::new(Header::new(0x06, 1), Bytes::from_static(&[0x01])).into()
    }

    #[test]
    fn test_outbound_frame_from_frame() {
        let frame = commit_response();
        assert_eq!(frame.header, [0x02, 0x55, 0x06, 0x01, 0x00]);
        assert_eq!(frame.size(), HEADER_SIZE + 1);
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![commit_response()];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![commit_response()];
        let slices = build_remaining_slices(&batch, 3);
        assert_eq!(slices.len(), 2);
        assert_eq!(&*slices[0], &[0x01, 0x00]);
        assert_eq!(&*slices[1], &[0x01]);
    }

    #[test]
    fn test_build_remaining_slices_skips_empty_payload() {
        let empty: OutboundFrame = Frame::new(Header::new(0x23, 0), Bytes::new()).into();
        let batch = vec![empty, commit_response()];

        let slices = build_remaining_slices(&batch, HEADER_SIZE);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), HEADER_SIZE);
        assert_eq!(slices[1].len(), 1);
    }

    #[tokio::test]
    async fn test_write_batch_preserves_order() {
        let mut buf = Cursor::new(Vec::new());
        let batch = vec![
            Frame::new(Header::new(0x23, 0), Bytes::new()).into(),
            commit_response(),
        ];

        write_batch(&mut buf, &batch).await.unwrap();

        let mut expected = build_frame(0x23, &[]);
        expected.extend(build_frame(0x06, &[0x01]));
        assert_eq!(buf.into_inner(), expected);
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        for _ in 0..10 {
            handle.send(commit_response()).await.unwrap();
        }
        drop(handle);
        task.await.unwrap().unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 10 * (HEADER_SIZE + 1));
        assert_eq!(&received[..6], &[0x02, 0x55, 0x06, 0x01, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, DEFAULT_CHANNEL_CAPACITY);

        assert_eq!(handle.pending_count(), 0);
        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_send_after_writer_failure() {
        let (client, server) = duplex(64);
        drop(server);
        let (handle, task) = spawn_writer_task(client, 1);

        handle.send(commit_response()).await.unwrap();
        assert!(task.await.unwrap().is_err());
        assert!(matches!(
            handle.send(commit_response()).await,
            Err(GatewayError::ConnectionClosed)
        ));
    }
}
