//! Process-level errors.
//!
//! Only startup and listener failures surface here. Per-connection I/O
//! errors stay inside the handler or client session that hit them.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    ConfigParse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to listen on {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("Failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}
