//! Configuration loading and typed config structures for the relay.
//!
//! The canonical configuration lives in `thermostream.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads, overrides from the environment, and
//! validates the file. Every field has a default so an empty document is
//! a runnable configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
pub use thermostream_db::StoreConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Upstream sensor link settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Reading store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Observer API and broadcast settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SENSOR_WS_URL` overrides `upstream.url`
    /// - `DATABASE_URL` overrides `store.database_url`
    /// - `PORT` overrides `observer.port`
    /// - `LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is not a valid port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override values from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is not a valid port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SENSOR_WS_URL") {
            self.upstream.url = val;
        }
        if let Some(val) = lookup("DATABASE_URL") {
            self.store.database_url = val;
        }
        if let Some(val) = lookup("PORT") {
            self.observer.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("PORT={val}: {e}")))?;
        }
        if let Some(val) = lookup("LOG_LEVEL") {
            self.logging.level = val;
        }
        Ok(())
    }

    /// Reject configurations the relay cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let up = &self.upstream;
        if up.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "upstream.initial_backoff_ms must be > 0".to_owned(),
            ));
        }
        if up.initial_backoff_ms > up.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "upstream.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                up.initial_backoff_ms, up.max_backoff_ms
            )));
        }
        for (name, value) in [
            ("upstream.connect_timeout_ms", up.connect_timeout_ms),
            ("upstream.idle_timeout_ms", up.idle_timeout_ms),
            ("store.connect_timeout_ms", self.store.connect_timeout_ms),
            ("store.write_timeout_ms", self.store.write_timeout_ms),
            ("observer.send_timeout_ms", self.observer.send_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        if up.channel_capacity == 0 || self.observer.session_buffer == 0 {
            return Err(ConfigError::Invalid(
                "channel capacities must be > 0".to_owned(),
            ));
        }
        if self.observer.max_snapshot_limit == 0 {
            return Err(ConfigError::Invalid(
                "observer.max_snapshot_limit must be > 0".to_owned(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "store.max_connections must be > 0".to_owned(),
            ));
        }
        if self.logging.format != "json" && self.logging.format != "pretty" {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// Upstream sensor link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpstreamConfig {
    /// `WebSocket` URL of the sensor source.
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// First reconnect delay after a failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap for the exponentially growing reconnect delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline for a single connection attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// A connection that receives nothing for this long is treated as lost.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Capacity of the link -> pipeline candidate channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl UpstreamConfig {
    /// First reconnect delay.
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Maximum reconnect delay.
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Connection attempt deadline.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle watchdog deadline.
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Observer API and broadcast hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-session queue depth before live readings are dropped.
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,

    /// Deadline for writing one frame to an observer socket.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Upper bound for snapshot requests.
    #[serde(default = "default_max_snapshot_limit")]
    pub max_snapshot_limit: u32,
}

impl ObserverConfig {
    /// Per-frame send deadline.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_buffer: default_session_buffer(),
            send_timeout_ms: default_send_timeout_ms(),
            max_snapshot_limit: default_max_snapshot_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Whether JSON output was requested.
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_upstream_url() -> String {
    "ws://localhost:4000".to_owned()
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_idle_timeout_ms() -> u64 {
    20_000
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    5000
}

const fn default_session_buffer() -> usize {
    64
}

const fn default_send_timeout_ms() -> u64 {
    1_000
}

const fn default_max_snapshot_limit() -> u32 {
    200
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}
