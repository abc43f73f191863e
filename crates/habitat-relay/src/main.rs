//! Habitat telemetry relay binary.
//!
//! Samples the simulated robots and the environment sensor array once per
//! tick and streams the resulting snapshot to every connected dashboard.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `relay-config.yaml` (or `HABITAT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the simulation bridge
//! 4. Resolve robot handles
//! 5. Create the broadcast hub and relay control
//! 6. Start the client-facing server
//! 7. Install the Ctrl-C handler
//! 8. Run the tick loop until stopped
//! 9. Disconnect and drain the server

mod error;
mod hub_sink;

use std::path::PathBuf;
use std::sync::Arc;

use habitat_core::assembler::{SnapshotAssembler, resolve_tracked_robots};
use habitat_core::config::RelayConfig;
use habitat_core::control::RelayControl;
use habitat_core::remote::RemoteSimGateway;
use habitat_core::scheduler;
use habitat_hub::{AppState, BroadcastHub, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;
use crate::hub_sink::HubSink;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "relay-config.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the simulator cannot be
/// reached, or the server cannot bind its port.
#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration.
    let (config, config_path, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("habitat-relay starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        simulator = %config.simulation.address(),
        tick_interval_ms = config.relay.tick_interval_ms,
        robots = config.robots.names.len(),
        "Relay configured"
    );

    // 3. Connect to the simulation bridge.
    let mut gateway = RemoteSimGateway::connect_to(config.simulation.clone()).await?;
    info!(simulator = %config.simulation.address(), "Connected to simulation");

    // 4. Resolve robot handles.
    let tracked = resolve_tracked_robots(&mut gateway, &config.robots.names).await?;
    if tracked.len() < config.robots.names.len() {
        warn!(
            configured = config.robots.names.len(),
            resolved = tracked.len(),
            "Some robots are missing from the scene"
        );
    }
    info!(robots = tracked.len(), "Robot handles resolved");
    let assembler = SnapshotAssembler::new(tracked, config.environment.clone());

    // 5. Create the broadcast hub and relay control.
    let hub = Arc::new(BroadcastHub::new(config.server.client_queue_capacity));
    let control = Arc::new(RelayControl::new(config.relay.tick_interval_ms));

    // 6. Start the client-facing server.
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let app_state = Arc::new(AppState::new(Arc::clone(&hub), Arc::clone(&control)));
    let server_handle = habitat_hub::spawn_server(&server_config, app_state).await?;

    // 7. Stop on Ctrl-C.
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping relay");
                    control.request_stop();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    // 8. Run the tick loop.
    let mut sink = HubSink::new(Arc::clone(&hub));
    let summary = scheduler::run_relay(&mut gateway, &assembler, &mut sink, &control).await;

    // 9. Shut down.
    gateway.disconnect().await;
    control.request_stop();
    if let Err(e) = server_handle.await {
        warn!(error = %e, "Server task did not finish cleanly");
    }

    info!(
        ticks_attempted = summary.ticks_attempted,
        snapshots_published = summary.snapshots_published,
        ticks_skipped = summary.ticks_skipped,
        "habitat-relay shutdown complete"
    );

    Ok(())
}

/// Load the relay configuration.
///
/// Reads `HABITAT_CONFIG` if set, otherwise `relay-config.yaml` in the
/// working directory. A missing file means defaults, still subject to the
/// environment overrides and validation.
fn load_config() -> Result<(RelayConfig, PathBuf, bool), RelayError> {
    let path = std::env::var_os("HABITAT_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = RelayConfig::from_file(&path)?;
        Ok((config, path, true))
    } else {
        let mut config = RelayConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, path, false))
    }
}
