//! Ingestion pipeline: validate, persist, then publish.
//!
//! A reading is published to the hub only after the store acknowledged
//! it, so observers never see a reading that is not queryable. Candidates
//! are handled one at a time in arrival order; a failure affects only the
//! candidate that caused it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thermostream_db::ReadingStore;
use thermostream_types::{Candidate, NewReading, Reading};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::hub::BroadcastHub;

/// Default bound on a single store write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Counters describing ingestion outcomes since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    /// Candidates persisted and published.
    pub accepted: u64,
    /// Candidates rejected as malformed or invalid.
    pub rejected: u64,
    /// Candidates dropped because the store failed or timed out.
    pub store_failures: u64,
}

/// Check a candidate against the domain rules and fill in its timestamp.
///
/// The value must be finite and non-negative. A missing timestamp becomes
/// `now`.
///
/// # Errors
///
/// Returns [`IngestError::ValidationFailed`] for a non-finite or negative
/// value.
pub fn validate(candidate: &Candidate, now: DateTime<Utc>) -> Result<NewReading, IngestError> {
    let value = candidate.value;
    if !value.is_finite() {
        return Err(IngestError::ValidationFailed(format!(
            "value {value} is not a finite number"
        )));
    }
    if value < 0.0 {
        return Err(IngestError::ValidationFailed(format!(
            "value {value} is negative"
        )));
    }
    Ok(NewReading {
        value,
        timestamp: candidate.timestamp.unwrap_or(now),
    })
}

/// Turns candidates into stored, published readings.
pub struct IngestionPipeline<S> {
    store: Arc<S>,
    hub: Arc<BroadcastHub<S>>,
    write_timeout: Duration,
    accepted: AtomicU64,
    rejected: AtomicU64,
    store_failures: AtomicU64,
}

impl<S: ReadingStore> IngestionPipeline<S> {
    /// Create a pipeline writing to `store` and publishing to `hub`.
    pub const fn new(store: Arc<S>, hub: Arc<BroadcastHub<S>>) -> Self {
        Self {
            store,
            hub,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
        }
    }

    /// Bound each store write by `timeout`.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// The store readings are written to.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The hub readings are published to.
    pub const fn hub(&self) -> &Arc<BroadcastHub<S>> {
        &self.hub
    }

    /// Validate, persist and publish one candidate.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::ValidationFailed`] if the candidate breaks a
    /// domain rule, or [`IngestError::StoreUnavailable`] if the write
    /// failed or timed out. Nothing is published in either case.
    pub async fn ingest(&self, candidate: Candidate) -> Result<Reading, IngestError> {
        let new = match validate(&candidate, Utc::now()) {
            Ok(new) => new,
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(value = candidate.value, error = %e, "Rejected sensor reading");
                return Err(e);
            }
        };

        let stored = match tokio::time::timeout(self.write_timeout, self.store.insert(&new)).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) => {
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                warn!(value = new.value, error = %e, "Store rejected reading, dropping");
                return Err(e.into());
            }
            Err(_) => {
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    value = new.value,
                    timeout_ms = u64::try_from(self.write_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Store write timed out, dropping reading"
                );
                return Err(IngestError::StoreUnavailable(format!(
                    "write timed out after {:?}",
                    self.write_timeout
                )));
            }
        };

        let delivered = self.hub.publish(stored).await;
        self.accepted.fetch_add(1, Ordering::Relaxed);
        debug!(
            reading = %stored.id,
            value = stored.value,
            timestamp = %stored.timestamp,
            delivered,
            "Reading stored and published"
        );
        Ok(stored)
    }

    /// Consume candidates until every sender is gone.
    ///
    /// Failures are logged and counted; the loop never stops early.
    pub async fn run(&self, mut rx: mpsc::Receiver<Candidate>) {
        info!("Ingestion pipeline started");
        while let Some(candidate) = rx.recv().await {
            // Already logged and counted.
            let _ = self.ingest(candidate).await;
        }
        let stats = self.stats();
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            store_failures = stats.store_failures,
            "Ingestion pipeline drained"
        );
    }

    /// Current counters.
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}
