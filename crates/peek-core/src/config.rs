//! Configuration structures for peek.
//!
//! This module provides configuration types for all components of the application:
//!
//! - [`WatchConfig`] - Change source settings (raw event queue, broadcast depth)
//! - [`ServerConfig`] - HTTP/WebSocket server settings (address, session timeout)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with the values peek ships with,
//! and deserialize with `#[serde(default)]` so a configuration file only needs
//! the fields it overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Port used when neither `PORT` nor `--port` is given.
pub const DEFAULT_PORT: u16 = 8080;

/// Absolute lifetime of a viewer connection, in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Configuration for the change source.
///
/// # Examples
///
/// ```
/// use peek_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.channel_capacity, 100);
/// assert_eq!(config.broadcast_capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of the queue between the OS watcher thread and the async pump.
    ///
    /// When the queue is full the watcher thread blocks until it drains.
    pub channel_capacity: usize,

    /// Number of notifications a slow viewer may fall behind before its
    /// pending notifications are coalesced into one.
    pub broadcast_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            broadcast_capacity: 16,
        }
    }
}

/// Configuration for the HTTP/WebSocket server.
///
/// # Examples
///
/// ```
/// use peek_core::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.port, 8080);
/// assert_eq!(config.session_timeout(), Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: IpAddr,

    /// Port the listener binds to. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Absolute session timeout per connection, in milliseconds.
    pub session_timeout_ms: u64,

    /// Directory with viewer assets replacing the embedded page.
    pub assets_dir: Option<Utf8PathBuf>,
}

impl ServerConfig {
    /// Returns the socket address to listen on.
    #[inline]
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Returns the per-connection session timeout.
    #[inline]
    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            assets_dir: None,
        }
    }
}

/// Root configuration for peek.
///
/// # Examples
///
/// ```
/// use peek_core::Config;
///
/// let config = Config::default();
/// assert!(config.validate().is_ok());
///
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("session_timeout_ms"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Change source configuration.
    pub watch: WatchConfig,

    /// Server configuration.
    pub server: ServerConfig,
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults. The result is validated.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.channel_capacity",
                "must be at least 1",
            ));
        }
        if self.watch.broadcast_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.broadcast_capacity",
                "must be at least 1",
            ));
        }
        if self.server.session_timeout_ms == 0 {
            return Err(ConfigError::invalid_option(
                "server.session_timeout_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}
