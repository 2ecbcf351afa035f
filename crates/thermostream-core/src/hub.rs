//! Broadcast hub: fan-out of stored readings to observer sessions.
//!
//! The hub owns the set of registered sessions. Each session has its own
//! bounded queue; [`BroadcastHub::publish`] never waits on a session. If a
//! session's queue is full the reading is dropped for that session only,
//! and sessions whose receiver has gone away are pruned.
//!
//! # Ordering
//!
//! Publishes are serialized by the session-set lock and every queue is
//! FIFO, so a session registered before two publishes receives them in
//! publish order. No ordering is promised between a session's
//! [`snapshot`](BroadcastHub::snapshot) and the live stream: the two can
//! overlap or leave a small gap, and observers should de-duplicate by
//! reading `id`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thermostream_db::{ReadingStore, StoreError};
use thermostream_types::{Reading, SessionId};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Default per-session queue depth.
pub const DEFAULT_SESSION_BUFFER: usize = 64;

/// Default (and recommended) upper bound for snapshot requests.
pub const DEFAULT_MAX_SNAPSHOT_LIMIT: u32 = 200;

/// Receiving side of one registered observer session.
#[derive(Debug)]
pub struct ObserverSession {
    id: SessionId,
    rx: mpsc::Receiver<Reading>,
}

impl ObserverSession {
    /// Handle to pass to [`BroadcastHub::unregister`].
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the next live reading.
    ///
    /// Returns `None` once the session has been unregistered and its
    /// queue drained.
    pub async fn recv(&mut self) -> Option<Reading> {
        self.rx.recv().await
    }

    /// Take a queued reading without waiting.
    pub fn try_recv(&mut self) -> Option<Reading> {
        self.rx.try_recv().ok()
    }
}

/// Counters describing hub activity since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    /// Sessions currently registered.
    pub sessions: usize,
    /// Readings passed to `publish`.
    pub published: u64,
    /// Per-session deliveries dropped because a queue was full.
    pub dropped: u64,
}

/// Fan-out point between the ingestion pipeline and observers.
pub struct BroadcastHub<S> {
    store: Arc<S>,
    sessions: Mutex<BTreeMap<SessionId, mpsc::Sender<Reading>>>,
    session_buffer: usize,
    max_snapshot_limit: u32,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl<S: ReadingStore> BroadcastHub<S> {
    /// Create a hub with default buffer and snapshot limits.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sessions: Mutex::new(BTreeMap::new()),
            session_buffer: DEFAULT_SESSION_BUFFER,
            max_snapshot_limit: DEFAULT_MAX_SNAPSHOT_LIMIT,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Set the per-session queue depth (minimum 1).
    #[must_use]
    pub fn with_session_buffer(mut self, buffer: usize) -> Self {
        self.session_buffer = buffer.max(1);
        self
    }

    /// Set the snapshot size cap.
    #[must_use]
    pub const fn with_max_snapshot_limit(mut self, limit: u32) -> Self {
        self.max_snapshot_limit = limit;
        self
    }

    /// The store snapshots are served from.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Add a new session to the fan-out set.
    ///
    /// Only readings published after this call are delivered; use
    /// [`snapshot`](Self::snapshot) for history.
    pub async fn register(&self) -> ObserverSession {
        let (tx, rx) = mpsc::channel(self.session_buffer);
        let id = SessionId::new();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id, tx);
        debug!(session = %id, sessions = sessions.len(), "Observer session registered");
        ObserverSession { id, rx }
    }

    /// Remove a session. Idempotent; returns whether it was registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(&id).is_some();
        if removed {
            debug!(session = %id, sessions = sessions.len(), "Observer session unregistered");
        }
        removed
    }

    /// Deliver `reading` to every registered session without waiting.
    ///
    /// Returns the number of sessions that accepted the reading.
    pub async fn publish(&self, reading: Reading) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.lock().await;
        let mut delivered: usize = 0;
        let mut closed = Vec::new();

        for (id, tx) in &*sessions {
            match tx.try_send(reading) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(session = %id, reading = %reading.id, "Observer queue full, dropping reading");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            sessions.remove(&id);
            debug!(session = %id, "Pruned closed observer session");
        }

        delivered
    }

    /// The most recent readings, newest-first, capped at the snapshot limit.
    ///
    /// # Errors
    ///
    /// Returns the store's error if it cannot be read.
    pub async fn snapshot(&self, limit: u32) -> Result<Vec<Reading>, StoreError> {
        let limit = limit.min(self.max_snapshot_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.store.latest(limit).await
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Current counters.
    pub async fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.session_count().await,
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects
    )]

    use chrono::{TimeDelta, Utc};
    use thermostream_db::MemoryStore;
    use thermostream_types::{NewReading, ReadingId};

    use super::*;

    fn reading(value: f64) -> Reading {
        Reading {
            id: ReadingId::new(),
            value,
            timestamp: Utc::now(),
            received_at: Utc::now(),
        }
    }

    fn hub() -> BroadcastHub<MemoryStore> {
        BroadcastHub::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn publish_reaches_every_session_in_order() {
        let hub = hub();
        let mut a = hub.register().await;
        let mut b = hub.register().await;

        let first = reading(1.0);
        let second = reading(2.0);
        assert_eq!(hub.publish(first).await, 2);
        assert_eq!(hub.publish(second).await, 2);

        for session in [&mut a, &mut b] {
            assert_eq!(session.recv().await.map(|r| r.id), Some(first.id));
            assert_eq!(session.recv().await.map(|r| r.id), Some(second.id));
        }
    }

    #[tokio::test]
    async fn late_registration_sees_only_new_readings() {
        let hub = hub();
        hub.publish(reading(1.0)).await;

        let mut late = hub.register().await;
        assert!(late.try_recv().is_none());

        let fresh = reading(2.0);
        hub.publish(fresh).await;
        assert_eq!(late.try_recv().map(|r| r.id), Some(fresh.id));
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_stops_delivery() {
        let hub = hub();
        let mut session = hub.register().await;
        let id = session.id();

        assert!(hub.unregister(id).await);
        assert!(!hub.unregister(id).await);

        assert_eq!(hub.publish(reading(1.0)).await, 0);
        assert!(session.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_session_drops_without_blocking_others() {
        let hub = hub().with_session_buffer(1);
        let mut slow = hub.register().await;
        let mut fast = hub.register().await;

        let first = reading(1.0);
        let second = reading(2.0);
        hub.publish(first).await;
        assert_eq!(fast.recv().await.map(|r| r.id), Some(first.id));

        // `slow` never drained its single slot.
        assert_eq!(hub.publish(second).await, 1);
        assert_eq!(fast.recv().await.map(|r| r.id), Some(second.id));
        assert_eq!(slow.try_recv().map(|r| r.id), Some(first.id));
        assert!(slow.try_recv().is_none());

        let stats = hub.stats().await;
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.sessions, 2);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let hub = hub();
        let gone = hub.register().await;
        let _kept = hub.register().await;
        drop(gone);

        assert_eq!(hub.publish(reading(1.0)).await, 1);
        assert_eq!(hub.session_count().await, 1);
    }

    #[tokio::test]
    async fn snapshot_is_clamped_and_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let base = Utc::now();
        for i in 0..10 {
            store
                .insert(&NewReading {
                    value: f64::from(i),
                    timestamp: base + TimeDelta::seconds(i64::from(i)),
                })
                .await
                .unwrap();
        }
        let hub = BroadcastHub::new(Arc::clone(&store)).with_max_snapshot_limit(4);

        let snap = hub.snapshot(1000).await.unwrap();
        assert_eq!(snap.len(), 4);
        assert!(snap.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert!(hub.snapshot(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_surfaces_store_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let hub = BroadcastHub::new(store);
        assert!(hub.snapshot(10).await.is_err());
    }
}
