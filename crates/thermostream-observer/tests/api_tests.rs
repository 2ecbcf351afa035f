//! Integration tests for the Observer API endpoints.
//!
//! REST tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The `WebSocket` test binds an ephemeral port and
//! talks to the server with a real client.

#![allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thermostream_core::{BroadcastHub, IngestionPipeline};
use thermostream_db::{MemoryStore, ReadingStore};
use thermostream_observer::router::build_router;
use thermostream_observer::server::serve;
use thermostream_observer::state::AppState;
use thermostream_types::{Candidate, NewReading, UpstreamState};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct Harness {
    store: Arc<MemoryStore>,
    upstream: watch::Sender<UpstreamState>,
    state: Arc<AppState<MemoryStore>>,
}

fn make_harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(BroadcastHub::new(Arc::clone(&store)));
    let pipeline = Arc::new(IngestionPipeline::new(Arc::clone(&store), hub));
    let (upstream, upstream_rx) = watch::channel(UpstreamState::Disconnected);
    let state = Arc::new(AppState::new(pipeline, upstream_rx));
    Harness {
        store,
        upstream,
        state,
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

/// Seed `values` one minute apart starting at [`base_time`].
async fn seed(store: &MemoryStore, values: &[f64]) {
    for (minute, value) in (0_i64..).zip(values) {
        store
            .insert(&NewReading {
                value: *value,
                timestamp: base_time() + TimeDelta::minutes(minute),
            })
            .await
            .unwrap();
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(harness: &Harness, uri: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(&harness.state))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post_json(harness: &Harness, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(&harness.state))
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Status page
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let harness = make_harness();
    let response = build_router(Arc::clone(&harness.state))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

// =========================================================================
// Query API
// =========================================================================

#[tokio::test]
async fn test_latest_empty_store() {
    let harness = make_harness();
    let (status, json) = get(&harness, "/api/readings/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_latest_is_newest_first_and_limited() {
    let harness = make_harness();
    seed(&harness.store, &[1.0, 2.0, 3.0]).await;

    let (status, json) = get(&harness, "/api/readings/latest?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["value"], 3.0);
    assert_eq!(data[1]["value"], 2.0);
    assert!(data[0]["id"].is_string());
    assert!(data[0]["receivedAt"].is_string());
}

#[tokio::test]
async fn test_latest_rejects_bad_limit() {
    let harness = make_harness();
    let (status, json) = get(&harness, "/api/readings/latest?limit=lots").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_range_pages_ascending_with_total_count() {
    let harness = make_harness();
    let values: Vec<f64> = (0..20).map(f64::from).collect();
    seed(&harness.store, &values).await;

    let (status, json) = get(
        &harness,
        "/api/readings/range?start=2026-03-01T10:00:00Z&end=2026-03-01T11:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let page = &json["data"];
    assert_eq!(page["totalCount"], 20);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 15);
    let readings = page["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 15);
    assert_eq!(readings[0]["value"], 0.0);
    assert_eq!(readings[14]["value"], 14.0);

    let (_, json) = get(
        &harness,
        "/api/readings/range?start=2026-03-01T10:00:00Z&end=2026-03-01T11:00:00Z&page=2&pageSize=15",
    )
    .await;
    let readings = json["data"]["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 5);
    assert_eq!(readings[0]["value"], 15.0);
}

#[tokio::test]
async fn test_range_requires_bounds() {
    let harness = make_harness();
    let (status, json) = get(&harness, "/api/readings/range?start=2026-03-01T10:00:00Z").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_range_rejects_inverted_bounds() {
    let harness = make_harness();
    let (status, json) = get(
        &harness,
        "/api/readings/range?start=2026-03-02T00:00:00Z&end=2026-03-01T00:00:00Z",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_stats() {
    let harness = make_harness();
    seed(&harness.store, &[1.0, 2.0, 3.0]).await;

    let (status, json) = get(&harness, "/api/readings/stats").await;

    assert_eq!(status, StatusCode::OK);
    let stats = &json["data"];
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["min"], 1.0);
    assert_eq!(stats["max"], 3.0);
    assert_eq!(stats["avg"], 2.0);
    assert!(stats["latestTimestamp"].is_string());
}

#[tokio::test]
async fn test_stats_empty_store() {
    let harness = make_harness();
    let (_, json) = get(&harness, "/api/readings/stats").await;

    assert_eq!(json["data"]["count"], 0);
    assert!(json["data"]["avg"].is_null());
}

#[tokio::test]
async fn test_hourly_buckets_recent_readings() {
    let harness = make_harness();
    harness
        .store
        .insert(&NewReading {
            value: 10.0,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

    let (status, json) = get(&harness, "/api/readings/hourly?hours=2").await;

    assert_eq!(status, StatusCode::OK);
    let buckets = json["data"].as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["avg"], 10.0);
    assert_eq!(buckets[0]["count"], 1);
}

#[tokio::test]
async fn test_query_reports_store_unavailable() {
    let harness = make_harness();
    harness.store.set_unavailable(true);

    let (status, json) = get(&harness, "/api/readings/latest").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
}

// =========================================================================
// Status
// =========================================================================

#[tokio::test]
async fn test_status_reflects_upstream_and_store() {
    let harness = make_harness();
    harness.upstream.send_replace(UpstreamState::Connected);

    let (status, json) = get(&harness, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["sensorConnected"], true);
    assert_eq!(json["data"]["upstream"], "connected");
    assert_eq!(json["data"]["store"], "ok");

    harness.store.set_unavailable(true);
    let (_, json) = get(&harness, "/api/status").await;
    assert_eq!(json["data"]["status"], "degraded");
    assert_eq!(json["data"]["store"], "unavailable");
}

// =========================================================================
// Ingestion input
// =========================================================================

#[tokio::test]
async fn test_ingest_stores_and_broadcasts() {
    let harness = make_harness();
    let mut session = harness.state.hub.register().await;

    let (status, json) = post_json(
        &harness,
        "/api/sensor/data",
        r#"{"value1": 21.5, "timestamp": "2026-03-01T10:00:00Z"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["value"], 21.5);

    let stored = harness.store.latest(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].timestamp, base_time());

    let published = session.try_recv().unwrap();
    assert_eq!(published.id, stored[0].id);
}

#[tokio::test]
async fn test_ingest_accepts_temperature_alias() {
    let harness = make_harness();
    let (status, json) =
        post_json(&harness, "/api/sensor/data", r#"{"temperature": 19.0}"#).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["value"], 19.0);
}

#[tokio::test]
async fn test_ingest_rejects_negative_value() {
    let harness = make_harness();
    let (status, json) = post_json(&harness, "/api/sensor/data", r#"{"value1": -3}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_ingest_rejects_missing_value() {
    let harness = make_harness();
    let (status, json) = post_json(
        &harness,
        "/api/sensor/data",
        r#"{"timestamp": "2026-03-01T10:00:00Z"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_ingest_rejects_malformed_json() {
    let harness = make_harness();
    let (status, json) = post_json(&harness, "/api/sensor/data", "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_ingest_reports_store_unavailable() {
    let harness = make_harness();
    let mut session = harness.state.hub.register().await;
    harness.store.set_unavailable(true);

    let (status, json) = post_json(&harness, "/api/sensor/data", r#"{"value1": 5}"#).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
    assert!(session.try_recv().is_none());
}

// =========================================================================
// WebSocket
// =========================================================================

async fn next_event<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_ws_session_lifecycle() {
    let harness = make_harness();
    seed(&harness.store, &[1.0, 2.0, 3.0]).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, Arc::clone(&harness.state), shutdown.clone()));

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/readings"))
        .await
        .unwrap();

    // Initial connection status.
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "connection_status");
    assert_eq!(event["data"]["sensorConnected"], false);
    assert_eq!(harness.state.hub.session_count().await, 1);

    // Snapshot request.
    ws.send(Message::text(r#"{"type": "request_latest", "limit": 2}"#))
        .await
        .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "latest_readings");
    let data = event["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["value"], 3.0);

    // Live reading.
    let reading = harness
        .state
        .pipeline
        .ingest(Candidate::untimed(42.0))
        .await
        .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "reading");
    assert_eq!(event["data"]["value"], 42.0);
    assert_eq!(event["data"]["id"], reading.id.to_string());

    // Upstream state change.
    harness.upstream.send_replace(UpstreamState::Connected);
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "connection_status");
    assert_eq!(event["data"]["sensorConnected"], true);
    assert_eq!(event["data"]["state"], "connected");

    // Bad request gets an error event, session survives.
    ws.send(Message::text("{\"limit\": -1}")).await.unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "error");

    ws.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.state.hub.session_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_ws_ping_is_answered_and_session_survives() {
    let harness = make_harness();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, Arc::clone(&harness.state), shutdown.clone()));

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/readings"))
        .await
        .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "connection_status");

    ws.send(Message::Ping(b"heartbeat".to_vec().into()))
        .await
        .unwrap();
    let pong = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Message::Pong(data) = ws.next().await.unwrap().unwrap() {
                return data;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(&pong[..], b"heartbeat");

    harness
        .state
        .pipeline
        .ingest(Candidate::untimed(7.5))
        .await
        .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "reading");
    assert_eq!(event["data"]["value"], 7.5);

    ws.close(None).await.unwrap();
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
