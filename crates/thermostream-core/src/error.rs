//! Error types for the ingestion core.
//!
//! Ingestion failures ([`IngestError`]) are absorbed and logged by the
//! upstream link; they are only surfaced to a caller on the HTTP ingest
//! path. Link failures ([`LinkError`]) never stop the reconnect loop.

use thermostream_db::StoreError;

/// Why a single candidate did not become a published reading.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The upstream payload could not be parsed.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The candidate violates a domain rule (e.g. negative value).
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The store did not accept the write; the reading was dropped.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

/// Errors raised by the upstream link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The configured source address is not a `ws://` or `wss://` URL.
    #[error("invalid upstream address {address:?}: {reason}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A connection attempt failed or timed out.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An established connection dropped.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
}
