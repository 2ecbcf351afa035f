//! Upstream link: a self-healing `WebSocket` client to the sensor source.
//!
//! [`UpstreamLink::start`] spawns a task that connects, forwards every
//! parsable message as a [`Candidate`] into the pipeline channel, and on
//! any failure waits with capped exponential backoff before reconnecting.
//! Malformed messages are logged and skipped; they never drop the
//! connection. A connection that stays silent longer than the idle
//! timeout is treated as lost.
//!
//! `wss://` sources are reached over rustls with the bundled webpki roots.
//!
//! The link's state is published on a `watch` channel so the status
//! endpoint and observer sessions can report it without polling the task.

use std::sync::Once;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thermostream_types::{Candidate, UpstreamState};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::UpstreamConfig;
use crate::error::LinkError;
use crate::parse::parse_upstream_message;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the running upstream connection task.
pub struct UpstreamLink {
    cancel: CancellationToken,
    state: watch::Receiver<UpstreamState>,
    task: JoinHandle<()>,
}

impl UpstreamLink {
    /// Validate `address` and spawn the connection loop.
    ///
    /// Candidates are sent to `sink` in arrival order. The loop ends when
    /// [`stop`](Self::stop) is called or every receiver of `sink` is gone.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidAddress`] if `address` is not a
    /// `ws://` or `wss://` URL. Connection failures are never returned;
    /// they are retried.
    pub fn start(
        address: &str,
        config: &UpstreamConfig,
        sink: mpsc::Sender<Candidate>,
    ) -> Result<Self, LinkError> {
        validate_address(address)?;
        if address.starts_with("wss://") {
            install_crypto_provider();
        }

        let (state_tx, state_rx) = watch::channel(UpstreamState::Disconnected);
        let cancel = CancellationToken::new();
        let settings = LinkSettings {
            address: address.to_owned(),
            backoff: Backoff::new(config.initial_backoff(), config.max_backoff()),
            connect_timeout: config.connect_timeout(),
            idle_timeout: config.idle_timeout(),
        };

        let task = tokio::spawn(run_link(settings, sink, state_tx, cancel.clone()));

        Ok(Self {
            cancel,
            state: state_rx,
            task,
        })
    }

    /// Ask the loop to close the connection and exit. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to finish. Call [`stop`](Self::stop) first.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Upstream link task ended abnormally");
        }
    }

    /// Current connection state.
    pub fn state(&self) -> UpstreamState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<UpstreamState> {
        self.state.clone()
    }
}

fn validate_address(address: &str) -> Result<(), LinkError> {
    let invalid = |reason: &str| LinkError::InvalidAddress {
        address: address.to_owned(),
        reason: reason.to_owned(),
    };
    if !(address.starts_with("ws://") || address.starts_with("wss://")) {
        return Err(invalid("scheme must be ws:// or wss://"));
    }
    let request = address
        .into_client_request()
        .map_err(|e| invalid(&e.to_string()))?;
    if request.uri().host().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// Install the ring provider for `wss://` handshakes once per process.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            debug!("rustls crypto provider already installed");
        }
    });
}

struct LinkSettings {
    address: String,
    backoff: Backoff,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

enum PumpExit {
    Cancelled,
    SinkClosed,
    Lost(LinkError),
}

async fn run_link(
    mut settings: LinkSettings,
    sink: mpsc::Sender<Candidate>,
    state: watch::Sender<UpstreamState>,
    cancel: CancellationToken,
) {
    let address = settings.address.clone();
    loop {
        state.send_replace(UpstreamState::Connecting);
        debug!(%address, "Connecting to sensor source");

        let attempt = tokio::select! {
            () = cancel.cancelled() => break,
            result = tokio::time::timeout(settings.connect_timeout, connect_async(address.as_str())) => result,
        };

        match attempt {
            Ok(Ok((socket, _response))) => {
                state.send_replace(UpstreamState::Connected);
                settings.backoff.reset();
                info!(%address, "Connected to sensor source");

                match pump(socket, &sink, &cancel, settings.idle_timeout).await {
                    PumpExit::Cancelled => break,
                    PumpExit::SinkClosed => {
                        info!("Candidate channel closed, stopping upstream link");
                        break;
                    }
                    PumpExit::Lost(e) => warn!(%address, error = %e, "Sensor connection lost"),
                }
            }
            Ok(Err(e)) => {
                let e = LinkError::Connect(e.to_string());
                warn!(%address, error = %e, "Sensor connection attempt failed");
            }
            Err(_) => {
                let e = LinkError::Connect(format!("timed out after {:?}", settings.connect_timeout));
                warn!(%address, error = %e, "Sensor connection attempt failed");
            }
        }

        state.send_replace(UpstreamState::Backoff);
        let delay = settings.backoff.next_delay();
        debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "Waiting before reconnect");
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    state.send_replace(UpstreamState::Disconnected);
    info!(%address, "Upstream link stopped");
}

async fn pump(
    mut socket: Socket,
    sink: &mpsc::Sender<Candidate>,
    cancel: &CancellationToken,
    idle_timeout: Duration,
) -> PumpExit {
    loop {
        let payload = tokio::select! {
            () = cancel.cancelled() => {
                let _ = socket.close(None).await;
                return PumpExit::Cancelled;
            }
            frame = tokio::time::timeout(idle_timeout, socket.next()) => {
                let Ok(frame) = frame else {
                    return PumpExit::Lost(LinkError::ConnectionLost(format!(
                        "no message for {idle_timeout:?}"
                    )));
                };
                match frame {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => text.to_owned(),
                        Err(e) => {
                            warn!(error = %e, "Skipping non UTF-8 binary message");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map_or_else(
                            || "closed by peer".to_owned(),
                            |f| format!("closed by peer: {} {}", u16::from(f.code), f.reason.as_str()),
                        );
                        return PumpExit::Lost(LinkError::ConnectionLost(reason));
                    }
                    // Pings are answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return PumpExit::Lost(LinkError::ConnectionLost(e.to_string())),
                    None => {
                        return PumpExit::Lost(LinkError::ConnectionLost("stream ended".to_owned()));
                    }
                }
            }
        };

        let candidate = match parse_upstream_message(&payload) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, "Skipping malformed sensor message");
                continue;
            }
        };

        tokio::select! {
            () = cancel.cancelled() => {
                let _ = socket.close(None).await;
                return PumpExit::Cancelled;
            }
            sent = sink.send(candidate) => {
                if sent.is_err() {
                    let _ = socket.close(None).await;
                    return PumpExit::SinkClosed;
                }
            }
        }
    }
}
