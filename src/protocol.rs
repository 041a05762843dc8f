//! Line protocol spoken between client and server.
//!
//! ```text
//! Request:  PING\n
//! Response: PONG\n
//! ```
//!
//! Lines are newline-delimited with no other framing. Surrounding
//! whitespace (including a `\r` before the newline) is trimmed on read.
//! Line content is arbitrary bytes; invalid UTF-8 is decoded lossily.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Request line sent by the client.
pub const REQUEST: &[u8] = b"PING\n";

/// Reply line written by the server once the wait has elapsed.
pub const REPLY: &[u8] = b"PONG\n";

/// Initial buffer capacity, not a limit.
const LINE_CAPACITY: usize = 1024;

/// Reads newline-delimited lines from a stream.
pub struct LineReader<R> {
    reader: BufReader<R>,
    raw: Vec<u8>,
    line: String,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            raw: Vec::with_capacity(LINE_CAPACITY),
            line: String::with_capacity(LINE_CAPACITY),
        }
    }

    /// Read the next line, trimmed.
    ///
    /// End of stream is an error (`UnexpectedEof`), so a peer going away
    /// ends a read loop the same way any other failure does. A final line
    /// without a trailing newline is still returned.
    pub async fn read_line(&mut self) -> io::Result<&str> {
        self.raw.clear();

        let n = self.reader.read_until(b'\n', &mut self.raw).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }

        self.line.clear();
        self.line.push_str(&String::from_utf8_lossy(&self.raw));
        Ok(self.line.trim())
    }
}
