//! TCP client role.
//!
//! One session owns one connection and loops sending `PING` and waiting,
//! with no read timeout, for the delayed `PONG`. The first I/O error ends
//! the session; there is no reconnect.

use crate::protocol::{LineReader, REQUEST};
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{error, info};

/// A connected client and its send/receive cycle.
pub struct ClientSession {
    lines: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    replies: u64,
}

impl ClientSession {
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            lines: LineReader::new(reader),
            writer,
            replies: 0,
        })
    }

    /// Send one request and block until its reply line arrives.
    pub async fn round_trip(&mut self) -> io::Result<String> {
        info!("Sending PING to server");
        self.writer.write_all(REQUEST).await?;

        let reply = self.lines.read_line().await?.to_string();
        self.replies += 1;
        info!(reply = %reply, "Received from server");

        Ok(reply)
    }

    /// Replies received so far.
    pub fn replies(&self) -> u64 {
        self.replies
    }
}

/// Connect to `addr` and exchange requests until the first I/O error.
///
/// Errors are logged, not returned. Returns the number of replies received.
pub async fn run(addr: &str) -> u64 {
    info!(addr, "Connecting to server");

    let mut session = match ClientSession::connect(addr).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "on connecting to server");
            return 0;
        }
    };

    loop {
        if let Err(e) = session.round_trip().await {
            error!(error = %e, replies = session.replies(), "on exchanging with server");
            return session.replies();
        }
    }
}
