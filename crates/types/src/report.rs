//! Report payload sent from the agent to the collector.

use crate::{ProduceStatus, ValidatorId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat per-node status record.
///
/// Field names are camelCase on the wire. `in_quorum` is tri-state and is
/// serialized as `null` when membership could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub server_name: String,
    pub pro_tx_hash: ValidatorId,
    /// Human-readable uptime, e.g. `"3d 4h 12m 9s"`.
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub uptime_in_seconds: Option<u64>,
    #[serde(default)]
    pub platform_block_height: Option<u64>,
    #[serde(default)]
    pub in_quorum: Option<bool>,
    #[serde(default)]
    pub validators_in_quorum: Option<usize>,
    #[serde(default)]
    pub quorum_changed: bool,
    #[serde(default)]
    pub latest_proposer: Option<ValidatorId>,
    pub produce_block_status: ProduceStatus,
    #[serde(default)]
    pub last_produced_height: Option<u64>,
    #[serde(default)]
    pub last_should_produce_block_height: Option<u64>,
    /// Dash Core health, flattened into the report.
    #[serde(flatten)]
    pub core: CoreStatus,
}

/// Masternode health as seen by Dash Core and from outside the host.
///
/// Every field is optional: a field the agent could not read is `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreStatus {
    #[serde(default)]
    pub core_block_height: Option<u64>,
    #[serde(default)]
    pub po_se_penalty: Option<u64>,
    /// Unset when the masternode was never revived.
    #[serde(default)]
    pub po_se_revived_height: Option<u64>,
    /// Unset unless the masternode is PoSe-banned.
    #[serde(default)]
    pub po_se_ban_height: Option<u64>,
    /// Unset when the masternode was never paid.
    #[serde(default)]
    pub last_paid_height: Option<u64>,
    /// Unix seconds of the last payment.
    #[serde(default)]
    pub last_paid_time: Option<u64>,
    /// 1-based position among enabled masternodes waiting for payment.
    #[serde(default)]
    pub payment_queue_position: Option<usize>,
    #[serde(default)]
    pub p2p_port_state: Option<PortState>,
    #[serde(default)]
    pub http_port_state: Option<PortState>,
}

/// Reachability of a service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortState {
    Open,
    Closed,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("OPEN"),
            Self::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Format seconds as `"Xd Yh Zm Ws"`.
pub fn format_uptime(seconds: u64) -> String {
    format!(
        "{}d {}h {}m {}s",
        seconds / 86_400,
        (seconds % 86_400) / 3_600,
        (seconds % 3_600) / 60,
        seconds % 60
    )
}
