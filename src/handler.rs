//! Per-connection handler for the server role.
//!
//! Reads request lines and schedules one delayed `PONG` per line. Replies
//! are independent tasks: the read loop never waits for them, several can be
//! in flight against the same connection, and they may complete in any
//! order if their waits differ.

use crate::keepalive::{self, KeepaliveParameters};
use crate::protocol::{LineReader, REPLY};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

/// Fire-time cap for waits too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Write side of a connection, shared by every reply scheduled on it.
pub type SharedWriter<W> = Arc<Mutex<W>>;

/// A reply waiting for its fire time.
pub struct PendingReply<W> {
    writer: SharedWriter<W>,
    fire_at: Instant,
    pending: Arc<AtomicUsize>,
}

impl<W> PendingReply<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a reply due `wait` from now.
    pub fn new(writer: SharedWriter<W>, wait: Duration, pending: Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        Self {
            writer,
            fire_at: now.checked_add(wait).unwrap_or(now + FAR_FUTURE),
            pending,
        }
    }

    /// Spawn the reply. The returned handle may be dropped; nothing needs to
    /// await it.
    pub fn schedule(self) -> JoinHandle<()> {
        tokio::spawn(self.fire().in_current_span())
    }

    async fn fire(self) {
        tokio::time::sleep_until(self.fire_at).await;
        info!("Sending scheduled reply now");

        let result = {
            let mut writer = self.writer.lock().await;
            writer.write_all(REPLY).await
        };

        let remaining = self.pending.fetch_sub(1, Ordering::Relaxed) - 1;
        if let Err(e) = result {
            warn!(error = %e, pending = remaining, "Scheduled reply could not be written");
        }
    }
}

/// Serve one accepted connection until its first read error.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    wait: Duration,
    params: KeepaliveParameters,
) {
    keepalive::configure(&stream, &params);

    let (reader, writer) = stream.into_split();
    serve_lines(reader, Arc::new(Mutex::new(writer)), wait)
        .instrument(tracing::info_span!("conn", peer = %peer))
        .await;
}

/// Read loop shared by real sockets and tests.
///
/// The read half is dropped on return; the write half is released once the
/// last pending reply holding it has fired.
pub async fn serve_lines<R, W>(reader: R, writer: SharedWriter<W>, wait: Duration)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    info!("Serving connection");

    let mut lines = LineReader::new(reader);
    let pending = Arc::new(AtomicUsize::new(0));

    loop {
        let received = match lines.read_line().await {
            Ok(line) => line,
            Err(e) => {
                error!(
                    error = %e,
                    pending = pending.load(Ordering::Relaxed),
                    "Error during reading from socket"
                );
                return;
            }
        };
        info!(received, "Received");

        PendingReply::new(Arc::clone(&writer), wait, Arc::clone(&pending)).schedule();
        info!(
            wait_secs = wait.as_secs(),
            pending = pending.load(Ordering::Relaxed),
            "Scheduled reply"
        );
    }
}
