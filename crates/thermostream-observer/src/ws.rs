//! `WebSocket` handler for live reading streaming.
//!
//! Clients connect to `GET /ws/readings`. Each connection registers an
//! observer session with the [`BroadcastHub`] and receives
//! [`ServerEvent`] envelopes:
//!
//! - `connection_status` once on connect and again whenever the upstream
//!   link changes state;
//! - `reading` for every reading stored after the session registered;
//! - `latest_readings` in reply to a `{"limit": N}` text frame;
//! - `error` when such a request cannot be served.
//!
//! Each outbound frame, pongs included, is bounded by the configured send
//! timeout. A frame that misses it is abandoned for this session only.
//! The session is unregistered when the client closes or the socket
//! errors.
//!
//! [`BroadcastHub`]: thermostream_core::BroadcastHub

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use thermostream_db::ReadingStore;
use thermostream_types::{ConnectionStatus, ServerEvent, SnapshotRequest};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming readings.
///
/// # Route
///
/// `GET /ws/readings`
pub async fn ws_readings<S: ReadingStore>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Drive one observer session until the client goes away.
async fn handle_ws<S: ReadingStore>(mut socket: WebSocket, state: Arc<AppState<S>>) {
    let mut session = state.hub.register().await;
    let session_id = session.id();
    debug!(session = %session_id, "WebSocket observer connected");

    let mut upstream = state.upstream.clone();
    let mut upstream_open = true;
    let initial = ServerEvent::ConnectionStatus(ConnectionStatus::from(*upstream.borrow_and_update()));

    if send_event(&mut socket, &initial, state.send_timeout).await {
        loop {
            tokio::select! {
                reading = session.recv() => {
                    let Some(reading) = reading else {
                        debug!(session = %session_id, "Session closed by hub");
                        break;
                    };
                    if !send_event(&mut socket, &ServerEvent::Reading(reading), state.send_timeout).await {
                        break;
                    }
                }
                changed = upstream.changed(), if upstream_open => {
                    if changed.is_err() {
                        // Link gone; keep serving readings.
                        upstream_open = false;
                        continue;
                    }
                    let status = ConnectionStatus::from(*upstream.borrow_and_update());
                    if !send_event(&mut socket, &ServerEvent::ConnectionStatus(status), state.send_timeout).await {
                        break;
                    }
                }
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let reply = answer_request(&state, text.as_str()).await;
                            if !send_event(&mut socket, &reply, state.send_timeout).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if !send_frame(&mut socket, Message::Pong(data), state.send_timeout).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(session = %session_id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Err(e)) => {
                            debug!(session = %session_id, error = %e, "WebSocket error");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    state.hub.unregister(session_id).await;
}

/// Turn a client text frame into the event to send back.
async fn answer_request<S: ReadingStore>(state: &AppState<S>, text: &str) -> ServerEvent {
    let request: SnapshotRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return ServerEvent::Error {
                message: format!("invalid request: {e}"),
            };
        }
    };

    match state.hub.snapshot(request.limit_or_default()).await {
        Ok(readings) => ServerEvent::LatestReadings(readings),
        Err(e) => {
            warn!(error = %e, "Snapshot for observer failed");
            ServerEvent::Error {
                message: format!("failed to load latest readings: {e}"),
            }
        }
    }
}

/// Send one event. Returns `false` once the socket is unusable.
async fn send_event(socket: &mut WebSocket, event: &ServerEvent, timeout: Duration) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize server event");
            return true;
        }
    };

    send_frame(socket, Message::Text(json.into()), timeout).await
}

/// Send one frame within `timeout`. A frame that misses the deadline is
/// abandoned; only a failed send marks the socket unusable.
async fn send_frame(socket: &mut WebSocket, frame: Message, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, socket.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "WebSocket client disconnected (send failed)");
            false
        }
        Err(_) => {
            debug!("WebSocket send timed out, frame abandoned");
            true
        }
    }
}
