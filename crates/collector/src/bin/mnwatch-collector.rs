//! mnwatch collector
//!
//! Receives reports and heartbeats from fleet agents and serves the fleet
//! view.
//!
//! # Usage
//!
//! ```bash
//! mnwatch-collector --listen-addr 0.0.0.0:8080 --data-dir /var/lib/mnwatch \
//!     --roster /etc/mnwatch/validators.txt
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use mnwatch_collector::{CollectorConfig, CollectorServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// mnwatch collector
///
/// Central HTTP collector for masternode fleet monitoring.
#[derive(Parser, Debug)]
#[command(name = "mnwatch-collector")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Directory for the fleet JSON documents
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Seconds a rendered fleet view is served from cache
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Roster of expected nodes, one `name,proTxHash` per line
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Seconds after which a roster node's last report counts as stale
    #[arg(long, default_value_t = 1800)]
    stale_after_secs: u64,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    info!("mnwatch collector starting...");

    let config = CollectorConfig {
        listen_addr: cli.listen_addr,
        data_dir: cli.data_dir,
        cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
        roster_path: cli.roster,
        stale_after: Duration::from_secs(cli.stale_after_secs),
    };

    let server = CollectorServer::new(config).context("Failed to start collector")?;
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .context("Collector stopped with an error")?;

    info!("Collector shutdown complete");
    Ok(())
}
