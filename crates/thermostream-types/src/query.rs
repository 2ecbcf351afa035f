//! Result types for the read-only query side of the reading store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::reading::Reading;

/// One page of an ascending time-range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReadingPage {
    /// Readings on this page, ascending by timestamp.
    pub readings: Vec<Reading>,
    /// Number of readings in the whole range, across all pages.
    pub total_count: u64,
    /// 1-based page number actually served.
    pub page: u32,
    /// Page size actually served (after clamping).
    pub page_size: u32,
}

/// Aggregate statistics over the full reading history.
///
/// When the store is empty `count` is 0 and every other field is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReadingStats {
    /// Number of stored readings.
    pub count: u64,
    /// Smallest stored value.
    pub min: Option<f64>,
    /// Largest stored value.
    pub max: Option<f64>,
    /// Mean of all stored values.
    pub avg: Option<f64>,
    /// Newest source timestamp.
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl ReadingStats {
    /// Statistics for an empty history.
    pub const fn empty() -> Self {
        Self {
            count: 0,
            min: None,
            max: None,
            avg: None,
            latest_timestamp: None,
        }
    }
}

/// Average and count for one calendar hour.
///
/// Buckets are always keyed in UTC, independent of the host timezone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HourlyBucket {
    /// Start of the UTC hour this bucket covers.
    pub hour: DateTime<Utc>,
    /// Mean value of readings in the hour.
    pub avg: f64,
    /// Number of readings in the hour.
    pub count: u64,
}
