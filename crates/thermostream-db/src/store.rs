//! The [`ReadingStore`] seam between the relay core and storage engines.
//!
//! The core treats the store as safe for concurrent single-row inserts
//! and concurrent reads; implementations provide whatever locking they
//! need internally. Two implementations ship with this crate:
//!
//! - [`PgReadingStore`](crate::PgReadingStore) -- durable `PostgreSQL` storage
//! - [`MemoryStore`](crate::MemoryStore) -- process-local storage for tests and demos

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use thermostream_types::{HourlyBucket, NewReading, Reading, ReadingPage, ReadingStats};

use crate::error::StoreError;

/// Largest page size a range query will serve.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Largest window (in hours) an hourly aggregation will cover: one year.
pub const MAX_HOURLY_WINDOW: u32 = 8760;

/// Durable, append-only collection of timestamped readings.
pub trait ReadingStore: Send + Sync + 'static {
    /// Persist a validated reading, assigning its ID and receive time.
    ///
    /// # Errors
    ///
    /// Returns a retryable [`StoreError`] if storage cannot accept writes.
    fn insert(
        &self,
        reading: &NewReading,
    ) -> impl Future<Output = Result<Reading, StoreError>> + Send;

    /// Return up to `limit` readings, newest-first by timestamp.
    fn latest(&self, limit: u32) -> impl Future<Output = Result<Vec<Reading>, StoreError>> + Send;

    /// Return one page of readings with `start <= timestamp <= end`,
    /// ascending, plus the total count of the range.
    ///
    /// `page` is 1-based; see [`Paging`] for clamping rules.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRange`] if `end < start`.
    fn range_ascending(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<ReadingPage, StoreError>> + Send;

    /// Count, min, max, mean and newest timestamp over the full history.
    fn aggregate_all(&self) -> impl Future<Output = Result<ReadingStats, StoreError>> + Send;

    /// Hourly means over the last `since_hours` hours, ascending by hour.
    ///
    /// Buckets are calendar hours in UTC.
    fn aggregate_hourly(
        &self,
        since_hours: u32,
    ) -> impl Future<Output = Result<Vec<HourlyBucket>, StoreError>> + Send;

    /// Cheap health check.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Normalized pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// 1-based page number (page 0 is treated as page 1).
    pub page: u32,
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
}

impl Paging {
    /// Clamp raw request parameters into a servable page.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(self) -> u64 {
        u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.page_size))
    }
}

/// Reject inverted ranges.
///
/// # Errors
///
/// Returns [`StoreError::InvalidRange`] if `end < start`.
pub fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), StoreError> {
    if end < start {
        return Err(StoreError::InvalidRange { start, end });
    }
    Ok(())
}

/// Lower bound of an hourly aggregation window ending at `now`.
pub fn hourly_window_start(now: DateTime<Utc>, since_hours: u32) -> DateTime<Utc> {
    let hours = since_hours.min(MAX_HOURLY_WINDOW);
    now.checked_sub_signed(TimeDelta::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn paging_clamps_inputs() {
        assert_eq!(Paging::new(0, 0), Paging { page: 1, page_size: 1 });
        assert_eq!(Paging::new(3, 10_000).page_size, MAX_PAGE_SIZE);
        assert_eq!(Paging::new(3, 15).offset(), 30);
        assert_eq!(Paging::new(1, 15).offset(), 0);
    }

    #[test]
    fn inverted_range_rejected() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
        assert!(matches!(
            check_range(start, end),
            Err(StoreError::InvalidRange { .. })
        ));
        assert!(check_range(start, start).is_ok());
    }

    #[test]
    fn hourly_window_is_capped() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            hourly_window_start(now, 24),
            Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(
            hourly_window_start(now, u32::MAX),
            hourly_window_start(now, MAX_HOURLY_WINDOW)
        );
    }
}
