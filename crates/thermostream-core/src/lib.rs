//! Ingestion core of the Thermostream sensor relay.
//!
//! Readings flow in one direction:
//!
//! ```text
//! sensor source --ws--> UpstreamLink --mpsc--> IngestionPipeline
//!                                                 |  insert
//!                                                 v
//!                                           ReadingStore
//!                                                 |  publish (after ack)
//!                                                 v
//!                                           BroadcastHub --> observer sessions
//! ```
//!
//! # Modules
//!
//! - [`backoff`] -- Capped exponential reconnect delay.
//! - [`config`] -- Configuration loading from `thermostream.yaml` into
//!   strongly-typed structs, with environment overrides.
//! - [`error`] -- [`IngestError`] and [`LinkError`].
//! - [`hub`] -- [`BroadcastHub`]: per-session bounded fan-out and
//!   snapshots.
//! - [`link`] -- [`UpstreamLink`]: the reconnecting `WebSocket` client.
//! - [`parse`] -- Decoding of raw upstream messages into candidates.
//! - [`pipeline`] -- [`IngestionPipeline`]: validate, persist, publish.

pub mod backoff;
pub mod config;
pub mod error;
pub mod hub;
pub mod link;
pub mod parse;
pub mod pipeline;

pub use config::{ConfigError, RelayConfig};
pub use error::{IngestError, LinkError};
pub use hub::{BroadcastHub, HubStats, ObserverSession};
pub use link::UpstreamLink;
pub use pipeline::{IngestStats, IngestionPipeline};
