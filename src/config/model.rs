//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a sensible default so the relay starts out of the box.

use crate::irc::connection::{ConnectionOptions, DEFAULT_PORT};
use crate::irc::transport::DEFAULT_READ_CHUNK;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::nickname::generate_nickname;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The IRC server to relay into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address of the IRC server.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// Ident for `USER`; defaults to the nickname.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    /// Server password sent with `PASS`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub channel_key: Option<String>,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: false,
            nickname: default_nickname(),
            username: None,
            realname: None,
            password: None,
            channels: vec![],
            channel_key: None,
            quit_message: default_quit_message(),
            accept_invalid_certs: false,
        }
    }
}

impl ServerConfig {
    pub fn ident(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }
}

/// Socket timing and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            quit_grace_ms: default_quit_grace_ms(),
            read_chunk: default_read_chunk(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn options(&self, server: &ServerConfig) -> ConnectionOptions {
        ConnectionOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            quit_grace: Duration::from_millis(self.quit_grace_ms),
            read_chunk: self.read_chunk.max(1),
            accept_invalid_certs: server.accept_invalid_certs,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Chat transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_true")]
    pub log_channels: bool,
    #[serde(default)]
    pub log_queries: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            log_channels: true,
            log_queries: false,
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_nickname() -> String {
    generate_nickname()
}
fn default_true() -> bool {
    true
}
fn default_quit_message() -> String {
    "crabrelay".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_quit_grace_ms() -> u64 {
    2000
}
fn default_read_chunk() -> usize {
    DEFAULT_READ_CHUNK
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_reconnect_delay_secs() -> u64 {
    5
}
fn default_log_dir() -> String {
    "~/.local/share/crabrelay/logs".to_string()
}
