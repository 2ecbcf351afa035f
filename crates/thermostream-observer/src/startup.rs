//! Observer server startup helper for embedding in the relay binary.
//!
//! Provides [`spawn_observer`] which binds the listener eagerly and then
//! runs the Observer HTTP + `WebSocket` server on a background Tokio task,
//! so the relay learns about a port conflict before it starts ingesting.
//!
//! # Usage
//!
//! ```rust,ignore
//! use thermostream_observer::startup::spawn_observer;
//!
//! let shutdown = CancellationToken::new();
//! let handle = spawn_observer(&ServerConfig::default(), state, shutdown.clone()).await?;
//! // ... later
//! shutdown.cancel();
//! handle.await?;
//! ```

use std::sync::Arc;

use thermostream_db::ReadingStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{ServerConfig, ServerError, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the Observer server and serve it on a background Tokio task.
///
/// The task runs until `shutdown` is cancelled; await the returned
/// [`JoinHandle`] to wait for in-flight requests to finish.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or the
/// port cannot be bound.
pub async fn spawn_observer<S: ReadingStore>(
    config: &ServerConfig,
    state: Arc<AppState<S>>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, StartupError> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(handle)
}
