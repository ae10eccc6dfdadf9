//! KineSync - concurrent IMU synchronisation and joint-risk evaluation
//!
//! Reads one raw IMU CSV per configured sensor, fuses and aligns the streams,
//! and writes quaternions, kinematic frames and risk streams to a
//! timestamped run directory.
//!
//! # Usage
//!
//! ```bash
//! # Run with ./kinesync.toml (or built-in defaults)
//! cargo run --release
//!
//! # Explicit config, first 200 frames only
//! ./kinesync --config session.toml --frames 200
//!
//! # Validate a config file and exit
//! ./kinesync --config session.toml --check-config
//! ```
//!
//! # Environment Variables
//!
//! - `KINESYNC_CONFIG`: Path to the run configuration (used when `--config` is absent)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kinesync::config::RunConfig;
use kinesync::pipeline::{CsvSourceProvider, PipelineCoordinator, RunSummary};
use kinesync::storage::CsvDirectorySink;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "kinesync")]
#[command(about = "Synchronise IMU sensor streams and flag sustained joint risk")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML run configuration (overrides KINESYNC_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output directory for this run (overrides run.output_dir)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Directory holding one <sensor>.csv per sensor (overrides sensors.data_dir)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Number of frames to align (overrides run.expected_frames)
    #[arg(long)]
    frames: Option<usize>,

    /// Pace sources at the sensor frequency instead of reading at full speed
    #[arg(long)]
    realtime: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Resolve the run configuration and apply CLI overrides.
///
/// An explicit `--config` must load; otherwise `RunConfig::load()` falls back
/// through `$KINESYNC_CONFIG`, `./kinesync.toml` and defaults.
fn resolve_config(args: &CliArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("📄 Loading config from --config: {}", path.display());
            RunConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => RunConfig::load(),
    };

    if let Some(dir) = &args.data_dir {
        config.sensors.data_dir = dir.clone();
    }
    if let Some(frames) = args.frames {
        config.run.expected_frames = Some(frames);
    }
    if args.realtime {
        config.sensors.realtime = true;
    }

    config.validate().context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

fn print_summary(summary: &RunSummary, output_dir: &std::path::Path) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Run complete: {}", summary.state);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Frames:    {}", summary.frames);
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        info!("   Span:      {:.2}s .. {:.2}s", first, last);
    }
    info!("   Duration:  {} ms", summary.duration_ms);
    for producer in &summary.producers {
        info!(
            "   Sensor {:<12} {:>6} samples  ({})",
            producer.sensor, producer.samples, producer.state
        );
    }
    for (axis, frames) in &summary.sustained_severe {
        if *frames > 0 {
            warn!("   ⚠️  {} sustained SEVERE for {} frames", axis, frames);
        }
    }
    for (axis, frames) in &summary.sustained_moderate {
        if *frames > 0 {
            info!("   {} sustained MODERATE for {} frames", axis, frames);
        }
    }
    info!("   Output:    {}", output_dir.display());
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = resolve_config(&args)?;

    if args.check_config {
        info!(
            "✓ Configuration valid: {} enabled sensors, time step {}s",
            config.enabled_sensors().count(),
            config.run.time_step
        );
        return Ok(());
    }

    let started = Local::now();
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.output_dir(started));

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  KineSync - IMU Synchronisation & Joint Risk");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");
    info!("📥 Input:   {}", config.sensors.data_dir.display());
    for sensor in config.enabled_sensors() {
        info!("   {} -> {}", sensor.name, sensor.frame);
    }
    info!("📤 Output:  {}", output_dir.display());
    info!(
        "⏱️  Step:    {}s @ {} Hz{}",
        config.run.time_step,
        config.sensors.frequency_hz,
        if config.sensors.realtime { " (realtime)" } else { "" }
    );
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, stopping after the current cycle...");
        shutdown_token.cancel();
    });

    let mut provider = CsvSourceProvider::new(config.sensors.data_dir.clone());
    if config.sensors.realtime {
        provider = provider.realtime(config.sensors.frequency_hz);
    }
    let sink = Arc::new(CsvDirectorySink::new(output_dir.clone()));

    let mut coordinator = PipelineCoordinator::from_config(&config, Arc::new(provider), sink)
        .context("Failed to build pipeline")?
        .with_cancel_token(cancel_token);

    info!("🚀 Starting pipeline");
    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary, &output_dir);
            info!("");
            info!("✓ KineSync shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("❌ Pipeline aborted: {}", e);
            if let Some(sensor) = e.sensor() {
                error!("   Sensor: {}", sensor);
            }
            info!("   Aligned data written to {}", output_dir.display());
            Err(e).context("Pipeline run failed")
        }
    }
}
