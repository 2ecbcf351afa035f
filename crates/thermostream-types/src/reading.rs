//! The reading data model.
//!
//! A [`Candidate`] is what the upstream source (or an HTTP producer)
//! hands to the ingestion pipeline. Once validated it becomes a
//! [`NewReading`] with a concrete timestamp, and the store turns that
//! into a persisted [`Reading`] by assigning its ID and receive time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::ReadingId;

/// One persisted, timestamped sensor measurement.
///
/// Immutable once stored. This is the exact payload pushed to observers
/// as the `reading` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Reading {
    /// Store-assigned identifier.
    pub id: ReadingId,
    /// Measured value; never negative.
    pub value: f64,
    /// When the measurement was taken at the source.
    pub timestamp: DateTime<Utc>,
    /// When the relay accepted the reading.
    pub received_at: DateTime<Utc>,
}

/// A parsed but not yet validated reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Raw measured value.
    pub value: f64,
    /// Source timestamp, if the source supplied one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Create a candidate with an explicit source timestamp.
    pub const fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp: Some(timestamp),
        }
    }

    /// Create a candidate without a source timestamp.
    pub const fn untimed(value: f64) -> Self {
        Self {
            value,
            timestamp: None,
        }
    }
}

/// A validated reading ready to be inserted into the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    /// Validated value (finite, non-negative).
    pub value: f64,
    /// Source timestamp, defaulted to ingestion time when absent.
    pub timestamp: DateTime<Utc>,
}

/// Body of the `POST /api/sensor/data` ingestion endpoint.
///
/// Older producers send `value1` or `temperature`; both map onto the
/// single `value` field.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Measured value.
    #[serde(default, alias = "value1", alias = "temperature")]
    pub value: Option<f64>,
    /// Optional source timestamp (RFC 3339).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use super::*;

    #[test]
    fn reading_uses_camel_case_fields() {
        let reading = Reading {
            id: ReadingId::new(),
            value: 21.5,
            timestamp: Utc::now(),
            received_at: Utc::now(),
        };
        let json = serde_json::to_value(reading).unwrap();
        assert!(json.get("receivedAt").is_some());
        assert!(json.get("received_at").is_none());
        assert_eq!(json["value"], 21.5);
    }

    #[test]
    fn ingest_request_accepts_legacy_field_names() {
        let a: IngestRequest = serde_json::from_str(r#"{"value1": 3.5}"#).unwrap();
        let b: IngestRequest = serde_json::from_str(r#"{"temperature": 4.0}"#).unwrap();
        let c: IngestRequest =
            serde_json::from_str(r#"{"value": 5.0, "timestamp": "2026-01-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(a.value, Some(3.5));
        assert_eq!(b.value, Some(4.0));
        assert_eq!(c.value, Some(5.0));
        assert!(c.timestamp.is_some());
    }

    #[test]
    fn ingest_request_without_value_deserializes_to_none() {
        let req: IngestRequest = serde_json::from_str(r#"{"value2": 1}"#).unwrap();
        assert!(req.value.is_none());
    }
}
