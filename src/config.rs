//! Configuration for tcp-keepalive-test.
//!
//! Supports both command-line arguments and an optional TOML file.
//! CLI arguments take precedence over config file values.

use crate::error::Error;
use crate::keepalive::KeepaliveParameters;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which side of the test this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Client,
    Server,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tcp-keepalive-test")]
#[command(version)]
#[command(about = "test for tcp keepalive", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// client or server mode [default: client]
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// listen port for server [default: 9797]
    #[arg(long)]
    pub listen: Option<u16>,

    /// connect string for client [default: localhost:9797]
    #[arg(long)]
    pub connect: Option<String>,

    /// number of clients to spawn [default: 1]
    #[arg(long)]
    pub num_clients: Option<usize>,

    /// time in min to wait before sending reply [default: 60]
    #[arg(long)]
    pub wait: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    pub mode: Option<Mode>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub keepalive: KeepaliveSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: u16,
    /// Minutes to hold each reply
    #[serde(default = "default_wait_minutes")]
    pub wait_minutes: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            wait_minutes: default_wait_minutes(),
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_connect")]
    pub connect: String,
    #[serde(default = "default_num_clients")]
    pub num_clients: usize,
    /// Delay between spawning successive clients, in seconds
    #[serde(default = "default_stagger_secs")]
    pub stagger_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            num_clients: default_num_clients(),
            stagger_secs: default_stagger_secs(),
        }
    }
}

/// Keepalive tuning applied to accepted connections
#[derive(Debug, Deserialize)]
pub struct KeepaliveSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u32,
}

impl Default for KeepaliveSection {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: default_period_secs(),
            probe_count: default_probe_count(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

impl From<&KeepaliveSection> for KeepaliveParameters {
    fn from(section: &KeepaliveSection) -> Self {
        KeepaliveParameters {
            enabled: section.enabled,
            period: Duration::from_secs(section.period_secs),
            probe_count: section.probe_count,
            probe_interval: section.probe_interval_secs,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> u16 {
    9797
}

fn default_wait_minutes() -> u64 {
    60
}

fn default_connect() -> String {
    "localhost:9797".to_string()
}

fn default_num_clients() -> usize {
    1
}

fn default_stagger_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_period_secs() -> u64 {
    30
}

fn default_probe_count() -> u32 {
    3
}

fn default_probe_interval_secs() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub listen: u16,
    pub connect: String,
    pub num_clients: usize,
    pub wait: Duration,
    pub stagger: Duration,
    pub keepalive: KeepaliveParameters,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, Error> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    pub fn from_args(cli: CliArgs) -> Result<Self, Error> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| Error::ConfigRead(config_path.clone(), e))?;
            toml::from_str(&contents).map_err(|e| Error::ConfigParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let wait_minutes = cli.wait.unwrap_or(toml_config.server.wait_minutes);

        Config {
            mode: cli.mode.or(toml_config.mode).unwrap_or(Mode::Client),
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            connect: cli.connect.unwrap_or(toml_config.client.connect),
            num_clients: cli.num_clients.unwrap_or(toml_config.client.num_clients),
            wait: Duration::from_secs(wait_minutes.saturating_mul(60)),
            stagger: Duration::from_secs(toml_config.client.stagger_secs),
            keepalive: KeepaliveParameters::from(&toml_config.keepalive),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}
