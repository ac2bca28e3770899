//! # Peg-Chain Node Runtime
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, then `PEG_*` environment overrides)
//! 2. Install the tracing subscriber (`RUST_LOG`, default `info`)
//! 3. Lock the data directory, open the stores, load or create the chain
//! 4. Import `PEG_IMPORT` if set, on a blocking thread
//! 5. Wait for Ctrl+C, then flush and exit
//!
//! Ctrl+C raises the shutdown signal; an import in progress stops between
//! blocks and the node shuts down cleanly.

use anyhow::{Context, Result};
use node_runtime::adapters::ShutdownSignal;
use node_runtime::{NodeConfig, NodeContainer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("invalid configuration")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Peg-Chain Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Network: {}", config.network);
    info!("===========================================");

    let import = config.import.clone();
    let node = Arc::new(NodeContainer::open(config).context("failed to open the node")?);
    let shutdown = Arc::new(ShutdownSignal::new());

    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping...");
                shutdown.trigger();
            }
        });
    }

    if let Some(path) = import {
        let node = Arc::clone(&node);
        let signal = Arc::clone(&shutdown);
        let summary = tokio::task::spawn_blocking(move || node.import_file(&path, signal.flag()))
            .await
            .context("import task panicked")?;
        match summary {
            Ok(summary) => info!(
                "Import finished: {} read, {} accepted, {} orphaned, {} rejected{}",
                summary.read,
                summary.accepted,
                summary.orphaned,
                summary.rejected,
                if summary.interrupted { " (interrupted)" } else { "" }
            ),
            Err(e) => error!("Import failed: {}", e),
        }
    }

    if !shutdown.is_triggered() {
        info!("Node is running. Press Ctrl+C to stop.");
    }
    shutdown.wait().await;

    node.shutdown().context("shutdown failed")?;
    info!("Shutdown complete");
    Ok(())
}
