//! Per-node monitoring agent.
//!
//! One invocation, typically from cron:
//!
//! ```text
//! load config ─▶ open state file ─▶ run_cycle (membership + audit)
//!                                        │
//!                                        ▼
//!                        assemble NodeReport ─▶ stdout / POST collector
//! ```
//!
//! The chain node is reached through [`TenderdashRpcClient`]; the audit
//! itself lives in `mnwatch-audit`. When configured, Dash Core health comes
//! from [`DashCoreRpcClient`] and public ports are checked with
//! [`check_port`]; neither can fail the cycle.

pub mod config;
pub mod dash_core;
pub mod ports;
pub mod report;
pub mod rpc;

pub use dash_core::{
    collect_core_status, payment_queue_position, CoreClient, DashCoreRpcClient,
    MasternodeListEntry, MasternodeStatus,
};
pub use config::{AgentConfig, ConfigError, CoreConfig, PortsConfig};
pub use ports::check_port;
pub use report::{assemble_report, read_uptime, ReportError, ReportPoster, PROC_UPTIME};
pub use rpc::TenderdashRpcClient;
