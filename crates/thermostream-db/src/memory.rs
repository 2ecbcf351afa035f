//! Process-local reading store.
//!
//! [`MemoryStore`] mirrors the semantics of the `PostgreSQL` store
//! (ordering, inclusive bounds, paging, UTC hour buckets) without any
//! durability. It backs the test suites and the `memory://` demo mode,
//! and can be switched into an "unavailable" state to exercise storage
//! outages.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use thermostream_types::{
    HourlyBucket, NewReading, Reading, ReadingId, ReadingPage, ReadingStats,
};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{Paging, ReadingStore, check_range, hourly_window_start};

/// In-memory [`ReadingStore`] backed by a vector in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage: while unavailable every operation fails
    /// with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored readings.
    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    /// Whether the store holds no readings.
    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(String::from(
                "in-memory store switched off",
            )));
        }
        Ok(())
    }
}

impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StoreError> {
        self.check_available()?;
        let stored = Reading {
            id: ReadingId::new(),
            value: reading.value,
            timestamp: reading.timestamp,
            received_at: Utc::now(),
        };
        self.readings.write().await.push(stored);
        Ok(stored)
    }

    async fn latest(&self, limit: u32) -> Result<Vec<Reading>, StoreError> {
        self.check_available()?;
        let readings = self.readings.read().await;
        // Reverse first so the stable sort keeps newest-inserted first on ties.
        let mut newest: Vec<Reading> = readings.iter().rev().copied().collect();
        newest.sort_by_key(|r| Reverse((r.timestamp, r.received_at)));
        newest.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(newest)
    }

    async fn range_ascending(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> Result<ReadingPage, StoreError> {
        check_range(start, end)?;
        self.check_available()?;
        let paging = Paging::new(page, page_size);

        let readings = self.readings.read().await;
        let mut in_range: Vec<Reading> = readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .copied()
            .collect();
        in_range.sort_by_key(|r| (r.timestamp, r.received_at));

        let total_count = u64::try_from(in_range.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(paging.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(paging.page_size).unwrap_or(usize::MAX);
        let page_readings = in_range.into_iter().skip(skip).take(take).collect();

        Ok(ReadingPage {
            readings: page_readings,
            total_count,
            page: paging.page,
            page_size: paging.page_size,
        })
    }

    async fn aggregate_all(&self) -> Result<ReadingStats, StoreError> {
        self.check_available()?;
        let readings = self.readings.read().await;
        if readings.is_empty() {
            return Ok(ReadingStats::empty());
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0_f64;
        let mut latest: Option<DateTime<Utc>> = None;
        for r in readings.iter() {
            min = min.min(r.value);
            max = max.max(r.value);
            sum += r.value;
            latest = latest.max(Some(r.timestamp));
        }

        let count = u64::try_from(readings.len()).unwrap_or(u64::MAX);
        Ok(ReadingStats {
            count,
            min: Some(min),
            max: Some(max),
            avg: Some(mean(sum, count)),
            latest_timestamp: latest,
        })
    }

    async fn aggregate_hourly(&self, since_hours: u32) -> Result<Vec<HourlyBucket>, StoreError> {
        self.check_available()?;
        let since = hourly_window_start(Utc::now(), since_hours);

        let readings = self.readings.read().await;
        let mut buckets: BTreeMap<DateTime<Utc>, (f64, u64)> = BTreeMap::new();
        for r in readings.iter().filter(|r| r.timestamp >= since) {
            let hour = r
                .timestamp
                .duration_trunc(TimeDelta::hours(1))
                .unwrap_or(r.timestamp);
            let entry = buckets.entry(hour).or_insert((0.0, 0));
            entry.0 += r.value;
            entry.1 = entry.1.saturating_add(1);
        }

        Ok(buckets
            .into_iter()
            .map(|(hour, (sum, count))| HourlyBucket {
                hour,
                avg: mean(sum, count),
                count,
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}
