//! Mock sensor source for the Thermostream relay.
//!
//! Accepts `WebSocket` clients and sends each one a random temperature
//! every interval:
//!
//! ```json
//! {"temperature": "23.41", "timestamp": "2026-03-01T10:00:00.000Z"}
//! ```
//!
//! The value is formatted as a string with two decimals, the way the
//! bench sensors report it. Each connection has its own ticker and stops
//! as soon as the client goes away.

pub mod config;
pub mod server;

pub use config::{ConfigError, EmitterConfig};
pub use server::{EmitterError, SensorSample, serve};
