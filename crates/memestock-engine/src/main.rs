//! Market engine binary for the Memestock simulation.
//!
//! Wires the trend engine, the snapshot store, and the stocks API
//! together and runs the tick loop until a stop condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `memestock-config.yaml` (defaults if absent)
//!    and apply environment overrides
//! 2. Initialize structured logging (tracing), then report any ignored
//!    overrides
//! 3. Load the market file (fatal if missing or malformed)
//! 4. Build the trend engine, seeded when `market.seed` is set
//! 5. Start the stocks API server
//! 6. Run the tick loop until `max_ticks` or Ctrl-C
//! 7. Commit the final market state

mod error;
mod observer_callback;

use std::path::Path;
use std::sync::Arc;

use memestock_core::config::{IgnoredOverride, LoggingConfig, MemestockConfig};
use memestock_core::engine::TrendEngine;
use memestock_core::random::RngSource;
use memestock_core::runner;
use memestock_core::store::SnapshotStore;
use memestock_observer::ServerConfig;
use memestock_observer::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer_callback::ObserverCallback;

const CONFIG_PATH: &str = "memestock-config.yaml";

/// Application entry point for the market engine.
///
/// # Errors
///
/// Returns an error if configuration, the market file, or the API
/// server cannot be set up. The process then exits non-zero.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, ignored) = load_config(Path::new(CONFIG_PATH), |key| std::env::var(key).ok())?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("memestock-engine starting");
    for entry in &ignored {
        warn!(
            var = entry.var,
            value = %entry.value,
            reason = %entry.reason,
            "Ignoring invalid environment override"
        );
    }
    info!(
        data_path = %config.market.data_path.display(),
        port = config.server.port,
        tick_interval_ms = config.market.tick_interval_ms,
        commit_every_ticks = config.market.commit_every_ticks,
        seed = ?config.market.seed,
        "Configuration loaded"
    );

    // 3. Load the market file.
    let store = Arc::new(SnapshotStore::open(&config.market.data_path)?);

    // 4. Build the trend engine.
    let source = config
        .market
        .seed
        .map_or_else(RngSource::from_os, RngSource::from_seed);
    let mut engine = TrendEngine::with_params(config.trend, source);

    // 5. Start the stocks API server.
    let server_config = ServerConfig::from(&config.server);
    let app_state =
        Arc::new(AppState::new(Arc::clone(&store)).with_static_dir(config.server.static_dir));
    let observer_handle =
        memestock_observer::spawn_observer(&server_config, Arc::clone(&app_state)).await?;

    // 6. Run the tick loop.
    let run_config = config.market.run_config();
    let mut callback = ObserverCallback::new(app_state);
    tokio::select! {
        result = runner::run_market(&store, &mut engine, &run_config, &mut callback) => {
            info!(
                total_ticks = result.total_ticks,
                failed_commits = result.failed_commits,
                "Tick loop finished"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
            }
        }
    }

    // 7. Commit the final state.
    let outcome = store.commit().await;
    info!(?outcome, "Final commit");

    observer_handle.abort();
    info!("memestock-engine stopped");
    Ok(())
}

/// Load `path` if present, otherwise defaults, then apply overrides
/// from `lookup`.
fn load_config(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(MemestockConfig, Vec<IgnoredOverride>), EngineError> {
    let mut config = if path.exists() {
        MemestockConfig::from_file(path)?
    } else {
        MemestockConfig::default()
    };
    let ignored = config.apply_overrides(lookup);
    Ok((config, ignored))
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
