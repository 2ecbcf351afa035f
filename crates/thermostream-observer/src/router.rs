//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use thermostream_db::ReadingStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/readings` -- `WebSocket` live reading stream
/// - `GET /api/readings/latest` -- newest readings
/// - `GET /api/readings/range` -- paged time range
/// - `GET /api/readings/stats` -- aggregate statistics
/// - `GET /api/readings/hourly` -- hourly means
/// - `GET /api/status` -- relay health
/// - `POST /api/sensor/data` -- submit a reading
///
/// CORS allows any origin.
pub fn build_router<S: ReadingStore>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index::<S>))
        // WebSocket
        .route("/ws/readings", get(ws::ws_readings::<S>))
        // Query API
        .route("/api/readings/latest", get(handlers::latest_readings::<S>))
        .route("/api/readings/range", get(handlers::range_readings::<S>))
        .route("/api/readings/stats", get(handlers::reading_stats::<S>))
        .route("/api/readings/hourly", get(handlers::hourly_readings::<S>))
        .route("/api/status", get(handlers::status::<S>))
        // Ingestion input
        .route("/api/sensor/data", post(handlers::ingest_reading::<S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
