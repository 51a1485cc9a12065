//! # Virtual Concat Runtime
//!
//! Binds `mtd-concat` nodes from a JSON config to composite devices.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (from env)
//! 2. Load configuration (from file, then env overrides)
//! 3. Register static devices and queue bound nodes
//! 4. Probe until every instance is active or the driver gives up
//! 5. Wait for Ctrl+C (unless `--once`), then tear down in reverse order

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vc_runtime::{RuntimeConfig, VirtConcatRuntime};
use vc_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

/// Virtual Concat runtime
#[derive(Parser, Debug)]
#[command(name = "vc-runtime")]
#[command(about = "Composite storage device runtime for mtd-concat nodes")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Probe, tear down and exit instead of waiting for Ctrl+C
    #[arg(long)]
    once: bool,

    /// Print Prometheus metrics after probing
    #[arg(long)]
    dump_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?
        .with_env_overrides();

    let mut runtime = VirtConcatRuntime::new(&config).context("Failed to create runtime")?;

    let summary = runtime.probe().await;
    info!(
        passes = summary.passes,
        active = summary.active,
        failed = summary.failed,
        "Probe complete"
    );
    for name in &summary.unresolved {
        warn!(instance = %name, "Instance still waiting for a dependency");
    }

    if args.dump_metrics {
        println!("{}", encode_metrics().context("Failed to encode metrics")?);
    }

    if !args.once {
        info!("Runtime is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
    }

    runtime.shutdown();
    Ok(())
}
