//! Parsing of raw upstream sensor messages.
//!
//! The sensor source sends JSON objects of the form
//! `{"temperature": 23.41, "timestamp": "2026-03-01T10:00:00.000Z"}`.
//! Some sources format the value as a string (`"23.41"`), so both are
//! accepted. A missing timestamp is left for the pipeline to default; a
//! present but unparsable one makes the whole message malformed.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thermostream_types::Candidate;

use crate::error::IngestError;

#[derive(Debug, Deserialize)]
struct UpstreamMessage {
    #[serde(alias = "value")]
    temperature: Numeric,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn to_f64(&self) -> Result<f64, IngestError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse().map_err(|e| {
                IngestError::MalformedMessage(format!("temperature {s:?} is not a number: {e}"))
            }),
        }
    }
}

/// Parse one upstream message into a candidate reading.
///
/// # Errors
///
/// Returns [`IngestError::MalformedMessage`] if the payload is not a JSON
/// object with a numeric `temperature` and an optional RFC 3339 `timestamp`.
pub fn parse_upstream_message(payload: &str) -> Result<Candidate, IngestError> {
    let msg: UpstreamMessage = serde_json::from_str(payload)
        .map_err(|e| IngestError::MalformedMessage(e.to_string()))?;

    let value = msg.temperature.to_f64()?;
    let timestamp = match msg.timestamp.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_timestamp(raw)?),
    };

    Ok(Candidate { value, timestamp })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| IngestError::MalformedMessage(format!("timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_numeric_temperature() {
        let c = parse_upstream_message(
            r#"{"temperature": 21.5, "timestamp": "2026-03-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(c.value, 21.5);
        assert_eq!(
            c.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn parses_string_temperature() {
        let c = parse_upstream_message(r#"{"temperature": "27.93", "timestamp": null}"#).unwrap();
        assert_eq!(c.value, 27.93);
        assert!(c.timestamp.is_none());
    }

    #[test]
    fn missing_timestamp_is_not_an_error() {
        let c = parse_upstream_message(r#"{"value": 3}"#).unwrap();
        assert_eq!(c.value, 3.0);
        assert!(c.timestamp.is_none());
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let c = parse_upstream_message(
            r#"{"temperature": 1, "timestamp": "2026-03-01T12:00:00+02:00"}"#,
        )
        .unwrap();
        assert_eq!(
            c.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            "not json",
            "[]",
            r#"{"timestamp": "2026-03-01T10:00:00Z"}"#,
            r#"{"temperature": "warm"}"#,
            r#"{"temperature": 20, "timestamp": "yesterday"}"#,
            r#"{"temperature": true}"#,
        ] {
            let result = parse_upstream_message(payload);
            assert!(
                matches!(result, Err(IngestError::MalformedMessage(_))),
                "payload {payload:?} should be malformed"
            );
        }
    }
}
