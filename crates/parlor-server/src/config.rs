//! Server configuration.
//!
//! Layered with `figment`: built-in defaults, then an optional JSON file,
//! then `PARLOR_*` environment variables. Callers may merge further
//! providers (CLI flags) on top of [`ServerConfig::figment`] before
//! extracting with [`ServerConfig::from_figment`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides, e.g. `PARLOR_PORT=9000`.
pub const ENV_PREFIX: &str = "PARLOR_";

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// A provider could not be read or a value had the wrong type.
    #[error("failed to load configuration: {0}")]
    Extract(Box<figment::Error>),
    /// A value parsed but is out of range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(Box::new(e))
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the Parlor server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8100`; `0` picks a free port).
    pub port: u16,
    /// Outbound frames buffered per connection before sends start failing.
    pub send_queue_capacity: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without inbound traffic.
    pub heartbeat_timeout_secs: u64,
    /// How long shutdown waits for connections to drain.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8100,
            send_queue_capacity: 256,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 300,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Defaults, then `path` (if given), then environment.
    ///
    /// Fails if `path` is given but does not exist.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Json::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate a config from any figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, optional file and environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue("host must not be empty".into()));
        }
        if self.send_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "send_queue_capacity must be at least 1".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size must be at least 1".into(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(ConfigError::InvalidValue(format!(
                "heartbeat_timeout_secs ({}) must not be shorter than heartbeat_interval_secs ({})",
                self.heartbeat_timeout_secs, self.heartbeat_interval_secs
            )));
        }
        Ok(())
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Idle timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Drain timeout on shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
