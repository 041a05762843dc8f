//! TCP server role.
//!
//! Accepts connections and hands each one to its own handler task, so a
//! quiet or slow connection never holds up the accept loop.

use crate::error::Error;
use crate::handler::handle_connection;
use crate::keepalive::KeepaliveParameters;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, Instrument};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    listener: TcpListener,
    wait: Duration,
    keepalive: KeepaliveParameters,
}

impl Server {
    /// Bind the listening socket. Must be called from within a tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        wait: Duration,
        keepalive: KeepaliveParameters,
    ) -> Result<Self, Error> {
        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|e| Error::Bind(addr, e))?;

        Ok(Server {
            listener,
            wait,
            keepalive,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until accepting fails.
    ///
    /// The listener is closed when this returns, on the error path too.
    pub async fn run(self) -> Result<(), Error> {
        loop {
            let (stream, peer) = self.listener.accept().await.map_err(Error::Accept)?;
            debug!(peer = %peer, "New connection");

            let wait = self.wait;
            let keepalive = self.keepalive;
            tokio::spawn(
                async move {
                    handle_connection(stream, peer, wait, keepalive).await;
                    debug!(peer = %peer, "Connection handler finished");
                }
                .in_current_span(),
            );
        }
    }
}

/// Listen on `listen_port` across all interfaces and serve until accept fails.
pub async fn serve(
    listen_port: u16,
    wait: Duration,
    keepalive: KeepaliveParameters,
) -> Result<(), Error> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen_port));
    let server = Server::bind(addr, wait, keepalive)?;

    let local = server.local_addr().map_err(|e| Error::Bind(addr, e))?;
    info!(addr = %local, wait_secs = wait.as_secs(), "Listening");

    server.run().await
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
