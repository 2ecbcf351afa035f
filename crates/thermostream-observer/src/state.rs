//! Shared application state for the Observer API server.
//!
//! [`AppState`] bundles the reading store, the broadcast hub, and the
//! ingestion pipeline that the REST and `WebSocket` handlers serve from,
//! plus a `watch` receiver reporting the upstream link's state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thermostream_core::{BroadcastHub, IngestionPipeline};
use thermostream_db::ReadingStore;
use thermostream_types::UpstreamState;
use tokio::sync::watch;

/// Default bound on a single outbound `WebSocket` frame.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState<S> {
    /// Reading store serving the query endpoints.
    pub store: Arc<S>,
    /// Fan-out hub for live readings and snapshots.
    pub hub: Arc<BroadcastHub<S>>,
    /// Pipeline used by the HTTP ingest endpoint.
    pub pipeline: Arc<IngestionPipeline<S>>,
    /// Upstream link state, updated by the link task.
    pub upstream: watch::Receiver<UpstreamState>,
    /// Per-frame send deadline for `WebSocket` sessions.
    pub send_timeout: Duration,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
}

impl<S: ReadingStore> AppState<S> {
    /// Build state around a pipeline; the store and hub are taken from it.
    pub fn new(pipeline: Arc<IngestionPipeline<S>>, upstream: watch::Receiver<UpstreamState>) -> Self {
        Self {
            store: Arc::clone(pipeline.store()),
            hub: Arc::clone(pipeline.hub()),
            pipeline,
            upstream,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            started_at: Utc::now(),
        }
    }

    /// Override the per-frame `WebSocket` send deadline.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Current upstream link state.
    pub fn upstream_state(&self) -> UpstreamState {
        *self.upstream.borrow()
    }
}
