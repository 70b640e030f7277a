//! Rocket Manager binary.
//!
//! Runs the HTTP API, the simulation loop and the crash watcher in one
//! process over a shared [`EngineContext`].
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (`ROCKETMAN_CONFIG`, `rocketman.yaml`, or the
//!    environment alone)
//! 3. Connect to Dragonfly and NATS
//! 4. Start the HTTP API
//! 5. Wait out the startup delay, then start both consumers
//! 6. On `Ctrl-C`, drain the API, stop the consumers and close both
//!    connections

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rocketman_api::{AppState, ServerConfig, start_server};
use rocketman_core::config::RocketConfig;
use rocketman_engine::{CrashWatcher, EngineContext, FlightRegistry, UpdateHandler};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "rocketman.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("rocketman starting");

    let config = load_config()?;
    info!(
        service = config.service.name,
        dragonfly_url = config.infrastructure.dragonfly_url,
        nats_url = config.infrastructure.nats_url,
        time_delta = config.physics.time_delta,
        startup_delay_ms = config.engine.startup_delay_ms,
        "configuration loaded"
    );

    let startup_delay = config.engine.startup_delay();
    let server_config = ServerConfig::from(&config.infrastructure);
    let ctx = Arc::new(
        EngineContext::connect(config)
            .await
            .context("failed to connect store and event bus")?,
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let state = Arc::new(AppState::new(Arc::clone(&ctx)));
    let api = tokio::spawn(async move {
        start_server(&server_config, state, async move {
            let _ = stop_rx.changed().await;
        })
        .await
    });

    let consumers = tokio::select! {
        () = tokio::time::sleep(startup_delay) => Some(spawn_consumers(&ctx)),
        _ = tokio::signal::ctrl_c() => None,
    };
    if consumers.is_some() {
        info!("consumers started");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    info!("shutdown requested");
    let _ = stop_tx.send(true);
    match api.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
    }
    for consumer in consumers.into_iter().flatten() {
        consumer.abort();
    }
    ctx.shutdown().await.context("engine shutdown failed")?;

    info!("rocketman shutdown complete");
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON
/// lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn load_config() -> anyhow::Result<RocketConfig> {
    let path = std::env::var_os("ROCKETMAN_CONFIG")
        .map(PathBuf::from)
        .or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        });

    match path {
        Some(path) => RocketConfig::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            info!("config file not found, using defaults and environment");
            RocketConfig::from_env().context("invalid environment configuration")
        }
    }
}

/// Start the simulation loop and crash watcher over one flight registry.
fn spawn_consumers(ctx: &Arc<EngineContext>) -> Vec<tokio::task::JoinHandle<()>> {
    let flights = FlightRegistry::new();
    let updates = UpdateHandler::new(Arc::clone(ctx), flights.clone());
    let crashes = CrashWatcher::new(Arc::clone(ctx), flights);

    vec![
        tokio::spawn(async move {
            if let Err(e) = updates.run().await {
                error!(error = %e, "simulation loop stopped");
            } else {
                warn!("simulation loop ended");
            }
        }),
        tokio::spawn(async move {
            if let Err(e) = crashes.run().await {
                error!(error = %e, "crash watcher stopped");
            } else {
                warn!("crash watcher ended");
            }
        }),
    ]
}
