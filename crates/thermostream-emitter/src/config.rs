//! Emitter settings with environment overrides.

use std::time::Duration;

/// Errors raised while building an [`EmitterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is present but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where to listen and what to send.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Delay between two samples on one connection.
    pub interval_ms: u64,
    /// Lower bound of generated temperatures (inclusive).
    pub min_value: f64,
    /// Upper bound of generated temperatures (exclusive).
    pub max_value: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 4000,
            interval_ms: 1_000,
            min_value: 20.0,
            max_value: 30.0,
        }
    }
}

impl EmitterConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable does not parse or
    /// the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from an arbitrary key lookup.
    ///
    /// Recognized keys: `EMITTER_HOST`, `EMITTER_PORT`,
    /// `EMITTER_INTERVAL_MS`, `EMITTER_MIN_VALUE`, `EMITTER_MAX_VALUE`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first variable that
    /// does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("EMITTER_HOST") {
            self.host = val;
        }
        if let Some(val) = lookup("EMITTER_PORT") {
            self.port = parse_var("EMITTER_PORT", &val)?;
        }
        if let Some(val) = lookup("EMITTER_INTERVAL_MS") {
            self.interval_ms = parse_var("EMITTER_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("EMITTER_MIN_VALUE") {
            self.min_value = parse_var("EMITTER_MIN_VALUE", &val)?;
        }
        if let Some(val) = lookup("EMITTER_MAX_VALUE") {
            self.max_value = parse_var("EMITTER_MAX_VALUE", &val)?;
        }
        Ok(())
    }

    /// Reject settings the emitter cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero interval or an empty
    /// or non-finite value range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be > 0".to_owned()));
        }
        if !(self.min_value.is_finite() && self.max_value.is_finite())
            || self.min_value >= self.max_value
        {
            return Err(ConfigError::Invalid(format!(
                "value range [{}, {}) is empty",
                self.min_value, self.max_value
            )));
        }
        Ok(())
    }

    /// Delay between samples.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn parse_var<T>(key: &str, val: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{key}={val}: {e}")))
}
