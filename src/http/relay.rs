//! Response relay to the client.
//!
//! # Responsibilities
//! - Copy a body to the client in fixed-size chunks
//! - Optionally flush buffered bytes on a timer (latency writer)
//! - Stop the flusher once the copy ends, whatever the outcome
//!
//! # Design Decisions
//! - The client side is an mpsc channel feeding `Body::from_stream`; a dropped
//!   receiver means the client went away and surfaces as a short write
//! - The writer and the flusher share one async mutex, so a flush never
//!   interleaves with a write

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;

/// Size of one copy chunk.
pub const COPY_CHUNK: usize = 32 * 1024;

const CHANNEL_DEPTH: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CopyError {
    #[error("client went away after {written} bytes")]
    ShortWrite { written: u64 },

    #[error("source failed after {written} bytes: {reason}")]
    Source { written: u64, reason: String },
}

/// Stream `body` to the client from a background task.
pub fn spawn_relay(body: Bytes, flush_interval: Option<Duration>) -> Body {
    if body.is_empty() {
        return Body::empty();
    }

    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
    tokio::spawn(async move {
        match copy_body(chunked(body), tx, flush_interval).await {
            Ok(written) => tracing::trace!(written, "Relay complete"),
            Err(e) => tracing::debug!(error = %e, "Relay ended early"),
        }
    });

    Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    }))
}

fn chunked(body: Bytes) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let len = body.len();
    stream::iter(
        (0..len)
            .step_by(COPY_CHUNK)
            .map(move |start| Ok(body.slice(start..(start + COPY_CHUNK).min(len)))),
    )
}

/// Copy every chunk of `source` into `sink`, returning the bytes written.
pub async fn copy_body<S, E>(
    source: S,
    sink: mpsc::Sender<Bytes>,
    flush_interval: Option<Duration>,
) -> Result<u64, CopyError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let writer = Arc::new(LatencyWriter::new(sink, flush_interval.is_some()));

    let flusher = flush_interval.map(|period| {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(flush_loop(writer.clone(), period, stop_rx));
        (stop_tx, handle)
    });

    let copied = copy_chunks(source, &writer).await;

    if let Some((stop_tx, handle)) = flusher {
        let _ = stop_tx.send(());
        let _ = handle.await;
    }

    let written = copied?;
    writer
        .flush()
        .await
        .map_err(|_| CopyError::ShortWrite { written })?;
    Ok(written)
}

async fn copy_chunks<S, E>(source: S, writer: &LatencyWriter) -> Result<u64, CopyError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut source = std::pin::pin!(source);
    let mut written = 0u64;

    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(|e| CopyError::Source {
            written,
            reason: e.to_string(),
        })?;
        let len = chunk.len() as u64;
        writer
            .write(chunk)
            .await
            .map_err(|_| CopyError::ShortWrite { written })?;
        written += len;
    }

    Ok(written)
}

async fn flush_loop(writer: Arc<LatencyWriter>, period: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = &mut stop => return,
            _ = ticker.tick() => {
                if writer.flush().await.is_err() {
                    return;
                }
            }
        }
    }
}

struct Closed;

struct Pending {
    buf: BytesMut,
    sink: mpsc::Sender<Bytes>,
}

impl Pending {
    async fn flush(&mut self) -> Result<(), Closed> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.sink.send(chunk).await.map_err(|_| Closed)
    }
}

/// Writes straight through, or buffers until the next flush when `buffered`.
struct LatencyWriter {
    inner: Mutex<Pending>,
    buffered: bool,
}

impl LatencyWriter {
    fn new(sink: mpsc::Sender<Bytes>, buffered: bool) -> Self {
        Self {
            inner: Mutex::new(Pending {
                buf: BytesMut::new(),
                sink,
            }),
            buffered,
        }
    }

    async fn write(&self, chunk: Bytes) -> Result<(), Closed> {
        let mut inner = self.inner.lock().await;
        if inner.sink.is_closed() {
            return Err(Closed);
        }
        if !self.buffered {
            return inner.sink.send(chunk).await.map_err(|_| Closed);
        }

        inner.buf.extend_from_slice(&chunk);
        if inner.buf.len() >= COPY_CHUNK {
            inner.flush().await
        } else {
            Ok(())
        }
    }

    async fn flush(&self) -> Result<(), Closed> {
        self.inner.lock().await.flush().await
    }
}
