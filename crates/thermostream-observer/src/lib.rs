//! Observer API server for the Thermostream sensor relay.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/readings`) streaming every stored
//!   reading, upstream connection status, and on-demand snapshots
//! - **REST query endpoints** for latest readings, paged ranges,
//!   aggregate statistics and hourly means
//! - **Ingestion endpoint** (`POST /api/sensor/data`) feeding the same
//!   pipeline as the upstream link
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Handlers are generic over the [`ReadingStore`] implementation so the
//! same router runs against `PostgreSQL` in production and the in-memory
//! store in tests. Live readings reach each `WebSocket` client through
//! its own bounded hub session; a slow client loses readings instead of
//! slowing anyone else down.
//!
//! [`ReadingStore`]: thermostream_db::ReadingStore

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
