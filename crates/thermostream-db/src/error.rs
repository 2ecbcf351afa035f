//! Error types for the reading store.
//!
//! All errors are propagated via [`StoreError`]. Callers on the query path
//! use [`StoreError::is_retryable`] to tell "temporarily unavailable" apart
//! from "bad input".

use chrono::{DateTime, Utc};

/// Errors that can occur in the reading store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing storage cannot currently accept reads or writes.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A range query whose end precedes its start.
    #[error("invalid range: end {end} precedes start {start}")]
    InvalidRange {
        /// Requested lower bound.
        start: DateTime<Utc>,
        /// Requested upper bound.
        end: DateTime<Utc>,
    },

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether retrying the same call later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Postgres(_))
    }
}
