//! Zenoh bridge for the Raspberry Pi Sense HAT.
//!
//! Long-lived edge process: read the HAT's environmental sensors every poll
//! interval, publish each reading to Zenoh, shut the session down cleanly
//! when the hosting runtime asks the process to stop.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use edgesense_common::LoggingConfig;
use zenoh_bridge_sensehat::config::{DEVICE_ID_ENV, SenseHatBridgeConfig, require_device_id};
use zenoh_bridge_sensehat::publisher::TelemetryPublisher;
use zenoh_bridge_sensehat::sensor::{IioSenseHat, SensorSource};
use zenoh_bridge_sensehat::sink::{MessageSink, ZenohSink};

/// Zenoh bridge for Raspberry Pi Sense HAT environmental telemetry.
#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-sensehat")]
#[command(about = "Publishes Sense HAT readings to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "sensehat.json5")]
    config: std::path::PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = SenseHatBridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    edgesense_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting zenoh-bridge-sensehat");
    info!("Loaded configuration from {:?}", args.config);

    // Device identity comes from the deployment environment and must be
    // resolved before anything touches the sensor or the network.
    let device_id = require_device_id(std::env::var(DEVICE_ID_ENV).ok())
        .context("Device identity is required")?;

    // Preflight: the HAT must be discoverable before we connect anywhere.
    let mut sensor = IioSenseHat::discover(
        &config.sensehat.iio_root,
        config.sensehat.framebuffer.clone(),
    )
    .context("Sense HAT preflight failed")?;

    sensor
        .reset()
        .context("Failed to reset Sense HAT display")?;

    // Connect the sink; from here on its shutdown runs on every exit path.
    let key_prefix = format!("{}/{}", config.sensehat.key_prefix, device_id);
    let sink = ZenohSink::connect(&config.zenoh, &key_prefix)
        .await
        .context("Failed to connect to Zenoh")?;

    // Publish bridge status
    let status_key = format!("{}/@/status", sink.key_prefix());
    let status = serde_json::json!({
        "bridge": "sensehat",
        "version": env!("CARGO_PKG_VERSION"),
        "device_id": device_id,
        "poll_interval_secs": config.sensehat.poll_interval_secs,
        "status": "running"
    });
    if let Err(e) = sink.publish_raw(&status_key, status.to_string().into_bytes()).await {
        warn!(error = %e, "Failed to publish bridge status");
    }

    // Termination handler: SIGTERM (edge runtime) or Ctrl+C sets the stop
    // flag; the loop picks it up between iterations.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Telemetry publisher stopped by edge runtime");
        let _ = stop_tx.send(true);
    });

    let publisher = TelemetryPublisher::new(
        device_id,
        &config.sensehat.output_channel,
        Duration::from_secs(config.sensehat.poll_interval_secs),
    );

    let result = publisher.run(&mut sensor, &sink, stop_rx).await;

    if let Err(e) = &result {
        error!("Unexpected error {}", e);
    }

    // Shutdown runs regardless of how the loop exited.
    let offline = serde_json::json!({ "bridge": "sensehat", "status": "offline" });
    let _ = sink.publish_raw(&status_key, offline.to_string().into_bytes()).await;

    info!("Shutting down Zenoh session...");
    if let Err(e) = sink.shutdown().await {
        warn!(error = %e, "Failed to close Zenoh session");
    }

    info!("Sense HAT bridge stopped");
    result.map_err(Into::into)
}

/// Wait for SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                // Fall back to Ctrl+C alone.
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {}
            r = tokio::signal::ctrl_c() => {
                if let Err(e) = r {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    }
}
