//! REST API endpoint handlers for the Observer server.
//!
//! Query handlers read straight from the [`ReadingStore`]; the ingest
//! handler goes through the same [`IngestionPipeline`] as the upstream
//! link, so a reading posted here is stored before it is broadcast.
//!
//! Successful responses are `{"success": true, "data": ...}`; failures
//! are rendered by [`ObserverError`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/readings/latest` | Newest readings (`?limit=N`) |
//! | `GET` | `/api/readings/range` | Paged range (`?start&end&page&pageSize`) |
//! | `GET` | `/api/readings/stats` | Aggregate statistics |
//! | `GET` | `/api/readings/hourly` | Hourly means (`?hours=H`) |
//! | `GET` | `/api/status` | Relay health and counters |
//! | `POST` | `/api/sensor/data` | Submit a reading |
//!
//! [`IngestionPipeline`]: thermostream_core::IngestionPipeline

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thermostream_db::{MAX_HOURLY_WINDOW, ReadingStore};
use thermostream_types::{Candidate, IngestRequest};

use crate::error::ObserverError;
use crate::state::AppState;

/// Default number of readings for `GET /api/readings/latest`.
pub const DEFAULT_LATEST_LIMIT: u32 = 100;

/// Upper bound for `GET /api/readings/latest`.
pub const MAX_LATEST_LIMIT: u32 = 1000;

/// Default page size for `GET /api/readings/range`.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// Default window for `GET /api/readings/hourly`.
pub const DEFAULT_HOURLY_WINDOW: u32 = 24;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// The endpoint's payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/readings/latest`.
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    /// Maximum number of readings (default 100, clamped to 1..=1000).
    pub limit: Option<u32>,
}

/// Query parameters for `GET /api/readings/range`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    /// Inclusive lower bound (RFC 3339).
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339).
    pub end: Option<DateTime<Utc>>,
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Readings per page (default 15).
    pub page_size: Option<u32>,
}

/// Query parameters for `GET /api/readings/hourly`.
#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    /// Window size in hours (default 24, clamped to 1..=8760).
    pub hours: Option<u32>,
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ObserverError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ObserverError::InvalidQuery(e.body_text()))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing relay status and API links.
pub async fn index<S: ReadingStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let upstream = state.upstream_state();
    let hub = state.hub.stats().await;
    let ingest = state.pipeline.stats();
    let started = state.started_at.to_rfc3339();
    let sessions = hub.sessions;
    let accepted = ingest.accepted;
    let rejected = ingest.rejected;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Thermostream Relay</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Thermostream Relay</h1>
    <p class="subtitle">Sensor ingestion and live broadcast, up since {started}</p>

    <div>
        <div class="metric">
            <div class="label">Sensor</div>
            <div class="value">{upstream}</div>
        </div>
        <div class="metric">
            <div class="label">Observers</div>
            <div class="value">{sessions}</div>
        </div>
        <div class="metric">
            <div class="label">Accepted</div>
            <div class="value">{accepted}</div>
        </div>
        <div class="metric">
            <div class="label">Rejected</div>
            <div class="value">{rejected}</div>
        </div>
    </div>

    <h2>API Endpoints</h2>
    <ul>
        <li>GET <a href="/api/readings/latest">/api/readings/latest</a> -- Newest readings (?limit=N)</li>
        <li>GET /api/readings/range -- Paged range (?start=&amp;end=&amp;page=&amp;pageSize=)</li>
        <li>GET <a href="/api/readings/stats">/api/readings/stats</a> -- Count, min, max, average</li>
        <li>GET <a href="/api/readings/hourly">/api/readings/hourly</a> -- Hourly averages (?hours=H)</li>
        <li>GET <a href="/api/status">/api/status</a> -- Relay health</li>
        <li>POST /api/sensor/data -- Submit a reading</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws/readings</code> -- Live reading stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/readings/*
// ---------------------------------------------------------------------------

/// Return the newest readings, newest-first.
pub async fn latest_readings<S: ReadingStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<LatestQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let params = query_params(query)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LATEST_LIMIT)
        .clamp(1, MAX_LATEST_LIMIT);

    let readings = state.store.latest(limit).await?;
    Ok(ApiResponse::ok(readings))
}

/// Return one ascending page of readings between `start` and `end`.
pub async fn range_readings<S: ReadingStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let params = query_params(query)?;
    let (Some(start), Some(end)) = (params.start, params.end) else {
        return Err(ObserverError::InvalidQuery(
            "start and end are required".to_owned(),
        ));
    };

    let page = state
        .store
        .range_ascending(
            start,
            end,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Return count, min, max, mean and newest timestamp over all readings.
pub async fn reading_stats<S: ReadingStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ObserverError> {
    let stats = state.store.aggregate_all().await?;
    Ok(ApiResponse::ok(stats))
}

/// Return hourly means over the last `hours` hours.
pub async fn hourly_readings<S: ReadingStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<HourlyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let params = query_params(query)?;
    let hours = params
        .hours
        .unwrap_or(DEFAULT_HOURLY_WINDOW)
        .clamp(1, MAX_HOURLY_WINDOW);

    let buckets = state.store.aggregate_hourly(hours).await?;
    Ok(ApiResponse::ok(buckets))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Relay health: store reachability, upstream state and counters.
///
/// Always answers 200; `status` is `"degraded"` when the store is
/// unreachable or the sensor is not connected.
pub async fn status<S: ReadingStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    let upstream = state.upstream_state();
    let hub = state.hub.stats().await;
    let ingest = state.pipeline.stats();

    let overall = if store_ok && upstream.is_connected() {
        "ok"
    } else {
        "degraded"
    };

    ApiResponse::ok(serde_json::json!({
        "status": overall,
        "store": if store_ok { "ok" } else { "unavailable" },
        "upstream": upstream,
        "sensorConnected": upstream.is_connected(),
        "observers": hub.sessions,
        "published": hub.published,
        "dropped": hub.dropped,
        "accepted": ingest.accepted,
        "rejected": ingest.rejected,
        "storeFailures": ingest.store_failures,
        "startedAt": state.started_at,
        "timestamp": Utc::now(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/sensor/data
// ---------------------------------------------------------------------------

/// Accept one reading from an HTTP producer.
///
/// The body is `{"value1" | "temperature" | "value": number, "timestamp"?: RFC 3339}`.
/// Responds 201 with the stored reading once it has been persisted and
/// broadcast.
pub async fn ingest_reading<S: ReadingStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(request) = body.map_err(|e| ObserverError::InvalidQuery(e.body_text()))?;
    let Some(value) = request.value else {
        return Err(ObserverError::InvalidQuery(
            "missing required field: value1 or temperature".to_owned(),
        ));
    };

    let reading = state
        .pipeline
        .ingest(Candidate {
            value,
            timestamp: request.timestamp,
        })
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(reading)))
}
