//! tcp-keepalive-test: check that idle TCP connections survive long waits.
//!
//! Two roles:
//! - server: accepts connections, enables keepalive probing on each, and
//!   answers every `PING` line with `PONG` only after a configurable wait
//! - client: opens connections (staggered by a minute) and sends `PING`,
//!   blocking until the delayed reply arrives
//!
//! Configuration via CLI arguments or TOML file.

mod client;
mod config;
mod error;
mod handler;
mod keepalive;
mod orchestrator;
mod protocol;
mod server;

use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load configuration; bad flags exit here through clap
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        listen = config.listen,
        connect = %config.connect,
        num_clients = config.num_clients,
        wait_secs = config.wait.as_secs(),
        "Starting tcp-keepalive-test"
    );

    if let Err(e) = orchestrator::run(&config).await {
        error!("Error: {e}");
        std::process::exit(1);
    }
}
