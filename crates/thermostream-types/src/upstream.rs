//! Upstream connection state as reported to observers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of the single upstream sensor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UpstreamState {
    /// Not connected and not trying (before start or after stop).
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and receiving messages.
    Connected,
    /// Waiting before the next reconnect attempt.
    Backoff,
}

impl UpstreamState {
    /// Whether readings can currently flow from the source.
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
        }
    }
}

impl core::fmt::Display for UpstreamState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `connection_status` observer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ConnectionStatus {
    /// True while the upstream sensor link is connected.
    pub sensor_connected: bool,
    /// Detailed link state.
    pub state: UpstreamState,
}

impl From<UpstreamState> for ConnectionStatus {
    fn from(state: UpstreamState) -> Self {
        Self {
            sensor_connected: state.is_connected(),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn only_connected_reports_sensor_connected() {
        assert!(ConnectionStatus::from(UpstreamState::Connected).sensor_connected);
        assert!(!ConnectionStatus::from(UpstreamState::Backoff).sensor_connected);
        assert!(!ConnectionStatus::from(UpstreamState::Connecting).sensor_connected);
    }

    #[test]
    fn display_matches_serde() {
        let json = serde_json::to_string(&UpstreamState::Backoff).unwrap();
        assert_eq!(json, format!("\"{}\"", UpstreamState::Backoff));
    }
}
