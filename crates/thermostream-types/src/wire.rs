//! Messages exchanged with observers over the live `WebSocket` channel.
//!
//! Every server frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Observers should de-duplicate by reading `id`: a `latest_readings`
//! snapshot can overlap with (or leave a small gap before) the live
//! `reading` stream.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::reading::Reading;
use crate::upstream::ConnectionStatus;

/// Default number of readings returned for a snapshot request without a limit.
pub const DEFAULT_SNAPSHOT_LIMIT: u32 = 15;

/// A frame pushed from the relay to an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerEvent {
    /// A newly stored reading.
    Reading(Reading),
    /// Response to a snapshot request, newest-first.
    LatestReadings(Vec<Reading>),
    /// Upstream sensor connectivity changed (also sent on connect).
    ConnectionStatus(ConnectionStatus),
    /// A request from the observer could not be served.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// A snapshot request sent by an observer: `{"limit": N}`.
///
/// The optional `type` field (`"request_latest"`) is accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SnapshotRequest {
    /// Request kind tag sent by some clients.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Maximum number of readings wanted.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SnapshotRequest {
    /// Requested limit, or [`DEFAULT_SNAPSHOT_LIMIT`] when absent.
    pub fn limit_or_default(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SNAPSHOT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;
    use crate::ids::ReadingId;
    use crate::upstream::UpstreamState;

    #[test]
    fn reading_event_envelope() {
        let reading = Reading {
            id: ReadingId::new(),
            value: 1.25,
            timestamp: Utc::now(),
            received_at: Utc::now(),
        };
        let json = serde_json::to_value(ServerEvent::Reading(reading)).unwrap();
        assert_eq!(json["event"], "reading");
        assert_eq!(json["data"]["id"], reading.id.to_string());
    }

    #[test]
    fn status_event_envelope() {
        let event = ServerEvent::ConnectionStatus(UpstreamState::Connected.into());
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["event"], "connection_status");
        assert_eq!(json["data"]["sensorConnected"], true);
        assert_eq!(json["data"]["state"], "connected");
    }

    #[test]
    fn snapshot_request_defaults_limit() {
        let req: SnapshotRequest = serde_json::from_str(r#"{"type":"request_latest"}"#).unwrap();
        assert_eq!(req.limit_or_default(), DEFAULT_SNAPSHOT_LIMIT);
        let req: SnapshotRequest = serde_json::from_str(r#"{"limit": 40}"#).unwrap();
        assert_eq!(req.limit_or_default(), 40);
    }
}
