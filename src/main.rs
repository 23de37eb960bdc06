//! iplocate server.
//!
//! Greets a caller with their public IP, ISP and location. Each request runs
//! the `GetAddressFromIP` workflow: three lookup activities executed in order
//! under a retry policy, with every attempt reported to a metrics backend.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /submit, /api
//!     ─────────────────────▶ http ──▶ workflow client ──▶ GetAddressFromIP
//!                                                            │
//!                                                            ▼
//!                                               pipeline: GetIP → GetLocationInfo
//!                                                            → GetInternetServiceProvider
//!                                                            │
//!                                     activity executor ◀────┘
//!                                     (retry policy, backoff, cancellation)
//!                                                            │
//!                                     instrumentation ──▶ metric sink
//!                                                         (prometheus | dogstatsd)
//! ```

use std::path::PathBuf;

use clap::Parser;

use iplocate::config::loader::{default_config, load_config};
use iplocate::lifecycle::{self, signals, Shutdown};
use iplocate::observability::logging;

#[derive(Parser)]
#[command(name = "iplocate")]
#[command(about = "Resolve a caller's IP, location and ISP through a retried workflow", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "iplocate starting");
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.server.bind_address,
        metrics_provider = %config.metrics.provider,
        task_queue = %config.workflow.task_queue,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let app = lifecycle::build(&config, shutdown.clone()).await?;
    tracing::info!(address = %app.local_addr()?, "Listening for connections");

    signals::spawn_signal_handler(shutdown);
    app.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
