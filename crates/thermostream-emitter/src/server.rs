//! `WebSocket` accept loop and per-connection sample ticker.

use std::net::SocketAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EmitterConfig};

/// Errors that stop the emitter.
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// The settings cannot be served.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The listener failed.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// One message as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSample {
    /// Temperature with two decimals, as a string.
    pub temperature: String,
    /// RFC 3339 with millisecond precision and a `Z` suffix.
    pub timestamp: String,
}

impl SensorSample {
    /// Format `value` measured at `at`.
    pub fn new(value: f64, at: DateTime<Utc>) -> Self {
        Self {
            temperature: format!("{value:.2}"),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// A random value from the configured range, stamped now.
    pub fn random(config: &EmitterConfig) -> Self {
        let value = rand::rng().random_range(config.min_value..config.max_value);
        Self::new(value, Utc::now())
    }
}

/// Accept clients on `listener` until `shutdown` is cancelled.
///
/// Every connection runs on its own task; cancelling `shutdown` also
/// closes the open ones.
///
/// # Errors
///
/// Returns [`EmitterError::Config`] if `config` does not validate, or
/// [`EmitterError::Io`] if the listener has no local address.
pub async fn serve(
    listener: TcpListener,
    config: EmitterConfig,
    shutdown: CancellationToken,
) -> Result<(), EmitterError> {
    config.validate()?;
    let addr = listener.local_addr()?;
    info!(%addr, interval_ms = config.interval_ms, "Mock sensor listening");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(stream_samples(stream, peer, config.clone(), shutdown.child_token()));
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
        }
    }

    info!("Mock sensor stopped");
    Ok(())
}

async fn stream_samples(
    stream: TcpStream,
    peer: SocketAddr,
    config: EmitterConfig,
    cancel: CancellationToken,
) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    info!(%peer, "Relay connected");

    let (mut sink, mut incoming) = socket.split();
    let mut ticks = tokio::time::interval(config.interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticks.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.close().await;
                break;
            }
            _ = ticks.tick() => {
                let json = match serde_json::to_string(&SensorSample::random(&config)) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize sample");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(json)).await {
                    debug!(%peer, error = %e, "Send failed");
                    break;
                }
            }
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "Read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!(%peer, "Relay disconnected");
}
