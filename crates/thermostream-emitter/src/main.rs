//! Mock sensor binary.
//!
//! Serves random temperatures on `ws://0.0.0.0:4000` (see
//! [`EmitterConfig`] for overrides) until `Ctrl-C`.

use thermostream_emitter::{EmitterConfig, EmitterError, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), EmitterError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = EmitterConfig::from_env()?;
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, config, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    match server.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Emitter task ended abnormally");
            Ok(())
        }
    }
}
