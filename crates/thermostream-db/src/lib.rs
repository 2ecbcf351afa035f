//! Reading store for the Thermostream sensor relay.
//!
//! The store is the durable, append-only history of every accepted
//! reading. The ingestion pipeline writes to it before anything is
//! published, and the query API reads from it out of band from the live
//! path.
//!
//! # Architecture
//!
//! ```text
//! IngestionPipeline --insert--> ReadingStore <--latest/range/stats-- Query API
//!                                   |
//!                                   +-- PgReadingStore (PostgreSQL, durable)
//!                                   +-- MemoryStore    (in-process, tests/demo)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`ReadingStore`] trait and shared paging/range rules
//! - [`config`] -- [`StoreConfig`], the `store:` settings
//! - [`reading_store`] -- `PostgreSQL` implementation of [`ReadingStore`],
//!   including pool setup and migrations
//! - [`memory`] -- In-memory implementation of [`ReadingStore`]
//! - [`error`] -- Shared error types

pub mod config;
pub mod error;
pub mod memory;
pub mod reading_store;
pub mod store;

// Re-export primary types for convenience.
pub use config::StoreConfig;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use reading_store::PgReadingStore;
pub use store::{MAX_HOURLY_WINDOW, MAX_PAGE_SIZE, Paging, ReadingStore};
