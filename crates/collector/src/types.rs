//! Request, response and stored document types.

use mnwatch_types::{NodeReport, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════

/// Response for `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Outcome of a write endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    /// `"success"` or `"error"`
    pub status: String,
    pub message: String,
}

impl WriteResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Heartbeats
// ═══════════════════════════════════════════════════════════════════════════

/// Body of `POST /heartbeat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub server_name: Option<String>,
    /// Whatever the node sends: epoch seconds or a formatted date.
    #[serde(default)]
    pub last_reboot_timestamp: Option<serde_json::Value>,
}

/// Stored heartbeat of one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRecord {
    pub last_reboot_timestamp: serde_json::Value,
    /// Unix seconds at which the collector received it.
    pub received_at: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════════════════════

/// Stored report of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    /// Unix seconds at which the collector received it.
    pub received_at: u64,
    #[serde(flatten)]
    pub report: NodeReport,
}

// ═══════════════════════════════════════════════════════════════════════════
// Fleet view
// ═══════════════════════════════════════════════════════════════════════════

/// Response for `/api/v1/fleet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    /// Unix seconds at which this snapshot was built.
    pub generated_at: u64,
    /// Latest report per server, keyed by server name.
    pub reports: BTreeMap<String, StoredReport>,
    /// Latest heartbeat per server, keyed by server name.
    pub heartbeats: BTreeMap<String, HeartbeatRecord>,
    /// Last quorum document received, verbatim.
    pub quorum_info: Option<serde_json::Value>,
    /// Number of reporting servers per produce-block status.
    pub status_counts: BTreeMap<String, usize>,
    /// Expected nodes and whether they are reporting; empty without a roster.
    #[serde(default)]
    pub roster: Vec<RosterStatus>,
}

/// Reporting state of one expected node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStatus {
    pub name: String,
    pub pro_tx_hash: ValidatorId,
    /// Server the latest matching report came from.
    pub server_name: Option<String>,
    pub last_report_at: Option<u64>,
    /// No report carries this node's ProTxHash.
    pub missing: bool,
    /// The latest report is older than the staleness limit.
    pub stale: bool,
}
