//! Event-stream relay with keep-alive heartbeats.
//!
//! A streaming response moves through `Idle -> Active -> Closed`. It becomes
//! active when the handler hands the upstream body to [`run`], which drives
//! two activities against one client sink:
//!
//! - the relay-read loop (this task) splits upstream bytes into lines and
//!   forwards every non-blank line,
//! - a spawned heartbeat task writes [`HEARTBEAT_FRAME`] on a fixed interval.
//!
//! Both share one [`CancellationToken`]. Whichever side sees the end first
//! (token cancelled, client write failure, upstream read failure, clean end
//! of stream) cancels it; the other side stops at its next select point.
//! The sink sits behind an async mutex and every write-and-flush happens
//! while holding it, so a heartbeat can only land between two lines.

use std::fmt::Display;
use std::io;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

/// Comment-only event written to keep idle connections open.
pub const HEARTBEAT_FRAME: &[u8] = b": heartbeat\n\n";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Chunks buffered between the relay and the client connection.
const CLIENT_CHANNEL_CAPACITY: usize = 32;

/// Why a relay reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Upstream ended cleanly and everything was forwarded.
    UpstreamFinished,
    /// Reading the upstream body failed mid-stream.
    UpstreamFailed,
    /// A write to the client failed.
    ClientGone,
    /// The shared token was cancelled (client disconnect or shutdown).
    Cancelled,
}

/// Summary of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub end: RelayEnd,
    pub lines: u64,
    pub heartbeats: u64,
}

/// The client side refused a write.
#[derive(Debug, Error)]
#[error("client connection closed")]
pub struct SinkClosed;

/// Destination for relayed bytes.
#[async_trait]
pub trait EventSink: Send + 'static {
    /// Write one complete chunk and flush it to the client.
    async fn write_flush(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;
}

/// Sink feeding the response body of the client connection.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write_flush(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        // Each message is yielded to hyper as its own frame.
        self.tx.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }
}

/// Body stream handed to the client connection.
///
/// Holds a drop guard on the relay's token: when the server drops the body
/// (client disconnected, connection reset) the relay is cancelled.
pub struct ClientStream {
    inner: ReceiverStream<Result<Bytes, io::Error>>,
    _cancel_on_drop: DropGuard,
}

impl Stream for ClientStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create the sink/body pair for one streaming response.
pub fn client_channel(cancel: CancellationToken) -> (ChannelSink, ClientStream) {
    let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
    (
        ChannelSink { tx },
        ClientStream {
            inner: ReceiverStream::new(rx),
            _cancel_on_drop: cancel.drop_guard(),
        },
    )
}

/// Relay `upstream` to `sink` until one side ends, with heartbeats every
/// `heartbeat` interval.
///
/// Returns only after the heartbeat task has stopped and the upstream body
/// has been dropped.
pub async fn run<St, E, S>(
    upstream: St,
    sink: S,
    cancel: CancellationToken,
    heartbeat: Duration,
) -> RelayOutcome
where
    St: Stream<Item = Result<Bytes, E>> + Send,
    E: Display + Send,
    S: EventSink,
{
    let sink = Arc::new(Mutex::new(sink));
    debug!(interval = ?heartbeat, "Relay active");

    let heartbeat_task = tokio::spawn(heartbeat_loop(
        Arc::clone(&sink),
        cancel.clone(),
        heartbeat.max(Duration::from_millis(1)),
    ));

    let (end, lines) = relay_lines(upstream, &sink, &cancel).await;
    cancel.cancel();

    let heartbeats = heartbeat_task.await.unwrap_or_else(|e| {
        warn!("Heartbeat task failed: {e}");
        0
    });

    info!(?end, lines, heartbeats, "Relay closed");
    RelayOutcome {
        end,
        lines,
        heartbeats,
    }
}

async fn relay_lines<St, E, S>(
    upstream: St,
    sink: &Mutex<S>,
    cancel: &CancellationToken,
) -> (RelayEnd, u64)
where
    St: Stream<Item = Result<Bytes, E>>,
    E: Display,
    S: EventSink,
{
    let mut upstream = pin!(upstream);
    let mut buf = BytesMut::new();
    let mut lines = 0u64;

    loop {
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = buf.split_to(pos + 1).freeze();
            if is_blank(&line) {
                continue;
            }
            if let Err(end) = write_chunk(sink, cancel, line).await {
                return (end, lines);
            }
            lines += 1;
        }

        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return (RelayEnd::Cancelled, lines),
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            Some(Err(e)) => {
                warn!("Upstream stream read failed: {e}");
                return (RelayEnd::UpstreamFailed, lines);
            }
            None => {
                // Unterminated final line.
                if !is_blank(&buf) {
                    let line = buf.split().freeze();
                    if let Err(end) = write_chunk(sink, cancel, line).await {
                        return (end, lines);
                    }
                    lines += 1;
                }
                return (RelayEnd::UpstreamFinished, lines);
            }
        }
    }
}

async fn heartbeat_loop<S: EventSink>(
    sink: Arc<Mutex<S>>,
    cancel: CancellationToken,
    period: Duration,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return sent,
            _ = ticker.tick() => {}
        }

        match write_chunk(&sink, &cancel, Bytes::from_static(HEARTBEAT_FRAME)).await {
            Ok(()) => {
                sent += 1;
                trace!(sent, "Heartbeat sent");
            }
            Err(RelayEnd::ClientGone) => {
                warn!("Error sending heartbeat, closing stream");
                cancel.cancel();
                return sent;
            }
            Err(_) => return sent,
        }
    }
}

/// Write one chunk under the sink lock, unless the relay is closing.
async fn write_chunk<S: EventSink>(
    sink: &Mutex<S>,
    cancel: &CancellationToken,
    chunk: Bytes,
) -> Result<(), RelayEnd> {
    let mut sink = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(RelayEnd::Cancelled),
        guard = sink.lock() => guard,
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RelayEnd::Cancelled),
        written = sink.write_flush(chunk) => written.map_err(|SinkClosed| {
            cancel.cancel();
            RelayEnd::ClientGone
        }),
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
