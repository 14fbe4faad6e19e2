//! mnwatch agent
//!
//! Runs one monitoring cycle against the local Tenderdash node and reports
//! the result.
//!
//! # Usage
//!
//! ```bash
//! # Print the report only
//! mnwatch-agent --config /etc/mnwatch/agent.toml
//!
//! # Deliver to a collector (overrides config)
//! mnwatch-agent --config agent.toml --report-url http://collector:8080/report
//! ```
//!
//! Exit status is non-zero on configuration errors and when the report could
//! not be delivered. Chain failures are not errors: they are reported as
//! `NO_DATA` and retried on the next run.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mnwatch_agent::{
    assemble_report, check_port, collect_core_status, read_uptime, AgentConfig, CoreConfig,
    DashCoreRpcClient, ReportPoster, TenderdashRpcClient, PROC_UPTIME,
};
use mnwatch_audit::{run_cycle, MembershipEvaluator};
use mnwatch_storage::FileStateStore;
use mnwatch_types::{CoreStatus, ValidatorId};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// mnwatch agent
///
/// Checks quorum membership and block production of the local masternode.
#[derive(Parser, Debug)]
#[command(name = "mnwatch-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Tenderdash RPC URL (overrides config)
    #[arg(long)]
    rpc_url: Option<String>,

    /// State file path (overrides config)
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Dash Core RPC URL (overrides config; enables Core fields)
    #[arg(long)]
    core_rpc_url: Option<String>,

    /// Collector report URL (overrides config)
    #[arg(long)]
    report_url: Option<String>,

    /// Server name to report under (overrides config)
    #[arg(long)]
    server_name: Option<String>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn apply_overrides(config: &mut AgentConfig, cli: &Cli) {
    if let Some(ref rpc_url) = cli.rpc_url {
        config.chain.rpc_url = rpc_url.clone();
    }

    if let Some(ref state_path) = cli.state_path {
        config.state.path = state_path.clone();
    }

    if let Some(ref core_rpc_url) = cli.core_rpc_url {
        match config.core {
            Some(ref mut core) => core.rpc_url = core_rpc_url.clone(),
            None => {
                config.core = Some(CoreConfig {
                    rpc_url: core_rpc_url.clone(),
                    rpc_user: None,
                    rpc_password: None,
                    request_timeout_ms: config.chain.request_timeout_ms,
                })
            }
        }
    }

    if let Some(ref report_url) = cli.report_url {
        config.report.url = Some(report_url.clone());
    }

    if let Some(ref server_name) = cli.server_name {
        config.node.server_name = server_name.clone();
    }
}

/// Core health and port reachability. Failures leave fields unset.
fn core_status(config: &AgentConfig, local: &ValidatorId) -> CoreStatus {
    let mut status = match config.core {
        Some(ref core) => {
            match DashCoreRpcClient::new(core.rpc_url.clone(), core.credentials(), core.timeout()) {
                Ok(client) => collect_core_status(&client, local),
                Err(e) => {
                    warn!(error = %e, "Failed to build Core RPC client");
                    CoreStatus::default()
                }
            }
        }
        None => CoreStatus::default(),
    };

    let timeout = config.ports.timeout();
    status.p2p_port_state = config
        .ports
        .p2p_addr
        .as_deref()
        .and_then(|addr| check_port(addr, timeout));
    status.http_port_state = config
        .ports
        .http_addr
        .as_deref()
        .and_then(|addr| check_port(addr, timeout));
    status
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AgentConfig::load(&cli.config)?;
    apply_overrides(&mut config, &cli);
    let local = config.local_validator()?;
    if config.node.server_name.trim().is_empty() {
        bail!("server_name must not be empty");
    }

    info!(
        local = %local.short(),
        server_name = %config.node.server_name,
        rpc_url = %config.chain.rpc_url,
        "Agent configuration loaded"
    );

    let mut store = FileStateStore::open(&config.state.path).with_context(|| {
        format!("Failed to open state file: {}", config.state.path.display())
    })?;
    let client = TenderdashRpcClient::new(config.chain.rpc_url.clone(), config.chain_timeout())
        .context("Failed to build chain RPC client")?;
    let evaluator = MembershipEvaluator::new(config.membership_config());

    let outcome = run_cycle(&client, &mut store, &local, &evaluator);
    if let Some(ref failure) = outcome.failure {
        warn!(error = %failure, "Cycle incomplete, will retry next run");
    }

    let report = assemble_report(
        &config.node.server_name,
        &local,
        &outcome,
        read_uptime(Path::new(PROC_UPTIME)),
        core_status(&config, &local),
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode report")?
    );

    if let Some(ref url) = config.report.url {
        let poster = ReportPoster::new(url.clone(), config.report_timeout())
            .context("Failed to build report client")?;
        if let Err(e) = poster.post(&report) {
            error!(%url, error = %e, "Report delivery failed");
            return Err(e).context("Report delivery failed");
        }
    }

    Ok(())
}
