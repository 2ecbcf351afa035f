//! Relay binary for Thermostream.
//!
//! Wires the upstream sensor link, ingestion pipeline, reading store,
//! broadcast hub and observer API together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `thermostream.yaml` (or `THERMOSTREAM_CONFIG`)
//!    with environment overrides, and validate it
//! 2. Initialize structured logging (tracing)
//! 3. Connect the reading store and run migrations (or use the in-memory
//!    store for `memory://`)
//! 4. Create the broadcast hub and start the ingestion pipeline task
//! 5. Start the upstream link
//! 6. Start the Observer API server
//! 7. Wait for `Ctrl-C`
//!
//! # Shutdown Sequence
//!
//! The link is stopped first so no new candidates arrive, the observer
//! server is drained, and finally the pipeline finishes whatever is left
//! in its channel.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use thermostream_core::config::LoggingConfig;
use thermostream_core::{BroadcastHub, IngestionPipeline, RelayConfig, UpstreamLink};
use thermostream_db::{MemoryStore, PgReadingStore, ReadingStore};
use thermostream_observer::{AppState, ServerConfig, spawn_observer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;

/// Config file looked up in the working directory when
/// `THERMOSTREAM_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "thermostream.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration.
    let config_path = resolve_config_path(|key| std::env::var(key).ok());
    let (config, loaded_from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);

    info!("thermostream-relay starting");
    if loaded_from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        upstream = %config.upstream.url,
        port = config.observer.port,
        store = if config.store.is_memory() { "memory" } else { "postgres" },
        "Relay configuration"
    );

    // 3. Connect the reading store.
    if config.store.is_memory() {
        warn!("Using in-memory reading store; readings are lost on exit");
        return run(&config, Arc::new(MemoryStore::new())).await;
    }

    let store = Arc::new(PgReadingStore::connect(&config.store).await?);
    let result = run(&config, Arc::clone(&store)).await;
    store.close().await;
    result
}

/// Run the relay against `store` until `Ctrl-C`, then shut down in order.
async fn run<S: ReadingStore>(config: &RelayConfig, store: Arc<S>) -> Result<(), RelayError> {
    // 4. Hub and pipeline.
    let hub = Arc::new(
        BroadcastHub::new(Arc::clone(&store))
            .with_session_buffer(config.observer.session_buffer)
            .with_max_snapshot_limit(config.observer.max_snapshot_limit),
    );
    let pipeline = Arc::new(
        IngestionPipeline::new(store, hub).with_write_timeout(config.store.write_timeout()),
    );

    let (candidate_tx, candidate_rx) = mpsc::channel(config.upstream.channel_capacity);
    let pipeline_task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(candidate_rx).await })
    };

    // 5. Upstream link. It owns the only candidate sender.
    let link = UpstreamLink::start(&config.upstream.url, &config.upstream, candidate_tx)?;
    info!(url = %config.upstream.url, "Upstream link started");

    // 6. Observer API server.
    let state = Arc::new(
        AppState::new(Arc::clone(&pipeline), link.subscribe_state())
            .with_send_timeout(config.observer.send_timeout()),
    );
    let shutdown = CancellationToken::new();
    let observer =
        spawn_observer(&ServerConfig::from(&config.observer), state, shutdown.clone()).await?;
    info!(port = config.observer.port, "Observer API server started");

    // 7. Wait for Ctrl-C.
    tokio::signal::ctrl_c().await.map_err(RelayError::Signal)?;
    info!("Shutdown requested");

    link.stop();
    link.join().await;

    shutdown.cancel();
    if let Err(e) = observer.await {
        warn!(error = %e, "Observer server task ended abnormally");
    }

    if let Err(e) = pipeline_task.await {
        warn!(error = %e, "Ingestion pipeline task ended abnormally");
    }

    let stats = pipeline.stats();
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        store_failures = stats.store_failures,
        "thermostream-relay shutdown complete"
    );
    Ok(())
}

/// Path of the YAML config file: `THERMOSTREAM_CONFIG` or the default.
fn resolve_config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("THERMOSTREAM_CONFIG")
        .filter(|path| !path.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load and validate the configuration.
///
/// A missing file is not an error: defaults plus environment overrides
/// are used. The returned flag tells whether the file was read.
fn load_config(path: &std::path::Path) -> Result<(RelayConfig, bool), RelayError> {
    let (config, from_file) = if path.exists() {
        (RelayConfig::from_file(path)?, true)
    } else {
        let mut config = RelayConfig::default();
        config.apply_env_overrides()?;
        (config, false)
    };
    config.validate()?;
    Ok((config, from_file))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn config_path_defaults_to_working_directory() {
        assert_eq!(
            resolve_config_path(|_| None),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
        assert_eq!(
            resolve_config_path(|_| Some("  ".to_owned())),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn config_path_honours_override() {
        let path = resolve_config_path(|key| {
            (key == "THERMOSTREAM_CONFIG").then(|| "/etc/thermostream/relay.yaml".to_owned())
        });
        assert_eq!(path, PathBuf::from("/etc/thermostream/relay.yaml"));
    }

    #[test]
    fn missing_config_file_yields_valid_defaults() {
        let (config, from_file) =
            load_config(std::path::Path::new("/nonexistent/thermostream.yaml")).unwrap();
        assert!(!from_file);
        assert!(config.validate().is_ok());
    }
}
