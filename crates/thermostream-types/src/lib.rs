//! Shared type definitions for the Thermostream sensor relay.
//!
//! This crate is the single source of truth for the data model shared by
//! the store, the ingestion core and the observer API. Types defined here
//! flow downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for readings and observer sessions
//! - [`reading`] -- Readings, ingestion candidates and the HTTP ingest body
//! - [`query`] -- Range pages, aggregate statistics and hourly buckets
//! - [`upstream`] -- Upstream connection state
//! - [`wire`] -- Observer `WebSocket` envelopes

pub mod ids;
pub mod query;
pub mod reading;
pub mod upstream;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use ids::{ReadingId, SessionId};
pub use query::{HourlyBucket, ReadingPage, ReadingStats};
pub use reading::{Candidate, IngestRequest, NewReading, Reading};
pub use upstream::{ConnectionStatus, UpstreamState};
pub use wire::{DEFAULT_SNAPSHOT_LIMIT, ServerEvent, SnapshotRequest};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // Types with #[ts(export)] are written to `bindings/` relative
        // to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::ReadingId::export_all();
        let _ = crate::ids::SessionId::export_all();
        let _ = crate::reading::Reading::export_all();
        let _ = crate::query::ReadingPage::export_all();
        let _ = crate::query::ReadingStats::export_all();
        let _ = crate::query::HourlyBucket::export_all();
        let _ = crate::upstream::UpstreamState::export_all();
        let _ = crate::upstream::ConnectionStatus::export_all();
        let _ = crate::wire::ServerEvent::export_all();
        let _ = crate::wire::SnapshotRequest::export_all();
    }
}
