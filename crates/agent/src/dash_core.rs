//! Dash Core JSON-RPC client and masternode health collection.
//!
//! | call | RPC method | fields |
//! |---|---|---|
//! | `block_count` | `getblockcount` | result |
//! | `masternode_status` | `masternode status` | `proTxHash`, `dmnState.{PoSePenalty,PoSeRevivedHeight,PoSeBanHeight,lastPaidHeight}` |
//! | `masternode_list` | `masternode list json` | `proTxHash`, `status`, `lastpaidblock`, `lastpaidtime` |
//!
//! Core reports unset heights as `-1` (and never-paid as `0`); both come out
//! as `None`.

use mnwatch_audit::ChainError;
use mnwatch_types::{CoreStatus, ValidatorId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{trace, warn};

/// Status Core gives a masternode eligible for payment.
pub const ENABLED_STATUS: &str = "ENABLED";

/// Health of the local masternode as Core sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasternodeStatus {
    pub pro_tx_hash: Option<ValidatorId>,
    pub pose_penalty: Option<u64>,
    pub pose_revived_height: Option<u64>,
    pub pose_ban_height: Option<u64>,
    pub last_paid_height: Option<u64>,
}

/// One row of the deterministic masternode list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasternodeListEntry {
    pub pro_tx_hash: ValidatorId,
    pub status: String,
    pub last_paid_block: u64,
    pub last_paid_time: u64,
}

/// Read-only view of the local Dash Core node.
pub trait CoreClient {
    /// Height of the Core chain tip.
    fn block_count(&self) -> Result<u64, ChainError>;

    /// State of the masternode this Core node runs.
    fn masternode_status(&self) -> Result<MasternodeStatus, ChainError>;

    /// Full masternode list.
    fn masternode_list(&self) -> Result<Vec<MasternodeListEntry>, ChainError>;
}

/// 1-based payment queue position of `local` among enabled masternodes.
///
/// The queue is ordered by last paid block, oldest first, ties broken by
/// ProTxHash. `None` when `local` is not enabled.
pub fn payment_queue_position(entries: &[MasternodeListEntry], local: &ValidatorId) -> Option<usize> {
    let mut queue: Vec<&MasternodeListEntry> = entries
        .iter()
        .filter(|e| e.status == ENABLED_STATUS)
        .collect();
    queue.sort_by(|a, b| {
        a.last_paid_block
            .cmp(&b.last_paid_block)
            .then_with(|| a.pro_tx_hash.cmp(&b.pro_tx_hash))
    });
    queue
        .iter()
        .position(|e| &e.pro_tx_hash == local)
        .map(|i| i + 1)
}

/// Gather Core health for `local`. Each query that fails leaves its fields
/// unset; nothing here fails the cycle.
pub fn collect_core_status<C: CoreClient + ?Sized>(client: &C, local: &ValidatorId) -> CoreStatus {
    let mut status = CoreStatus::default();

    match client.block_count() {
        Ok(height) => status.core_block_height = Some(height),
        Err(e) => warn!(error = %e, "Failed to read Core block count"),
    }

    match client.masternode_status() {
        Ok(mn) => {
            if let Some(ref reported) = mn.pro_tx_hash {
                if reported != local {
                    warn!(
                        core = %reported.short(),
                        configured = %local.short(),
                        "Core runs a different masternode than configured"
                    );
                }
            }
            status.po_se_penalty = mn.pose_penalty;
            status.po_se_revived_height = mn.pose_revived_height;
            status.po_se_ban_height = mn.pose_ban_height;
            status.last_paid_height = mn.last_paid_height;
        }
        Err(e) => warn!(error = %e, "Failed to read masternode status"),
    }

    match client.masternode_list() {
        Ok(entries) => {
            status.payment_queue_position = payment_queue_position(&entries, local);
            status.last_paid_time = entries
                .iter()
                .find(|e| &e.pro_tx_hash == local)
                .map(|e| e.last_paid_time)
                .filter(|t| *t > 0);
        }
        Err(e) => warn!(error = %e, "Failed to read masternode list"),
    }

    status
}

/// Blocking JSON-RPC client for Dash Core.
#[derive(Debug, Clone)]
pub struct DashCoreRpcClient {
    url: String,
    credentials: Option<(String, String)>,
    http: reqwest::blocking::Client,
}

impl DashCoreRpcClient {
    /// Create a client; every request is bounded by `timeout`.
    pub fn new(
        url: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, ChainError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            credentials,
            http,
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        trace!(method, "Core RPC request");
        let body = json!({
            "jsonrpc": "1.0",
            "id": "mnwatch",
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some((ref user, ref password)) = self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        let response = request.send().map_err(map_transport)?;
        let status = response.status();
        let bytes = response.bytes().map_err(map_transport)?;

        // Core answers RPC errors with HTTP 500 and an error envelope.
        let envelope: CoreEnvelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(ChainError::Status(status.as_u16())),
            Err(e) => return Err(ChainError::Malformed(format!("{method}: {e}"))),
        };
        if let Some(error) = envelope.error {
            return Err(ChainError::Rpc(format!("{method}: {} ({})", error.message, error.code)));
        }
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }
        envelope
            .result
            .ok_or_else(|| ChainError::Malformed(format!("{method}: missing result")))
    }
}

impl CoreClient for DashCoreRpcClient {
    fn block_count(&self) -> Result<u64, ChainError> {
        self.call("getblockcount", json!([]))
    }

    fn masternode_status(&self) -> Result<MasternodeStatus, ChainError> {
        let wire: MasternodeStatusWire = self.call("masternode", json!(["status"]))?;
        let pro_tx_hash = match wire.pro_tx_hash {
            Some(hex) => Some(parse_id(&hex)?),
            None => None,
        };
        let state = wire.dmn_state.unwrap_or_default();
        Ok(MasternodeStatus {
            pro_tx_hash,
            pose_penalty: state.pose_penalty,
            pose_revived_height: state.pose_revived_height,
            pose_ban_height: state.pose_ban_height,
            last_paid_height: state.last_paid_height.filter(|h| *h > 0),
        })
    }

    fn masternode_list(&self) -> Result<Vec<MasternodeListEntry>, ChainError> {
        let wire: BTreeMap<String, MasternodeListWire> =
            self.call("masternode", json!(["list", "json"]))?;
        wire.into_values()
            .map(|row| {
                Ok(MasternodeListEntry {
                    pro_tx_hash: parse_id(&row.pro_tx_hash)?,
                    status: row.status,
                    last_paid_block: row.last_paid_block,
                    last_paid_time: row.last_paid_time,
                })
            })
            .collect()
    }
}

fn map_transport(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout
    } else {
        ChainError::Transport(e.to_string())
    }
}

fn parse_id(hex: &str) -> Result<ValidatorId, ChainError> {
    ValidatorId::from_hex(hex).map_err(|e| ChainError::Malformed(format!("proTxHash {hex:?}: {e}")))
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct CoreEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<CoreRpcError>,
}

#[derive(Deserialize)]
struct CoreRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct MasternodeStatusWire {
    #[serde(rename = "proTxHash", default)]
    pro_tx_hash: Option<String>,
    #[serde(rename = "dmnState", default)]
    dmn_state: Option<DmnStateWire>,
}

#[derive(Deserialize, Default)]
struct DmnStateWire {
    #[serde(rename = "PoSePenalty", default)]
    pose_penalty: Option<u64>,
    #[serde(rename = "PoSeRevivedHeight", default, deserialize_with = "height_or_unset")]
    pose_revived_height: Option<u64>,
    #[serde(rename = "PoSeBanHeight", default, deserialize_with = "height_or_unset")]
    pose_ban_height: Option<u64>,
    #[serde(rename = "lastPaidHeight", default, deserialize_with = "height_or_unset")]
    last_paid_height: Option<u64>,
}

#[derive(Deserialize)]
struct MasternodeListWire {
    #[serde(rename = "proTxHash")]
    pro_tx_hash: String,
    status: String,
    #[serde(rename = "lastpaidblock", default)]
    last_paid_block: u64,
    #[serde(rename = "lastpaidtime", default)]
    last_paid_time: u64,
}

/// Core's `-1` (or any negative) means unset.
fn height_or_unset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw: Option<i64> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|h| u64::try_from(h).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnwatch_types::test_utils::test_validator;

    fn entry(seed: u8, status: &str, last_paid_block: u64) -> MasternodeListEntry {
        MasternodeListEntry {
            pro_tx_hash: test_validator(seed),
            status: status.to_string(),
            last_paid_block,
            last_paid_time: last_paid_block * 150,
        }
    }

    #[test]
    fn test_queue_position_orders_by_last_paid() {
        let entries = vec![
            entry(1, ENABLED_STATUS, 500),
            entry(2, ENABLED_STATUS, 100),
            entry(3, "POSE_BANNED", 50),
            entry(4, ENABLED_STATUS, 300),
        ];

        assert_eq!(payment_queue_position(&entries, &test_validator(2)), Some(1));
        assert_eq!(payment_queue_position(&entries, &test_validator(4)), Some(2));
        assert_eq!(payment_queue_position(&entries, &test_validator(1)), Some(3));
        assert_eq!(payment_queue_position(&entries, &test_validator(3)), None);
        assert_eq!(payment_queue_position(&entries, &test_validator(9)), None);
    }

    #[test]
    fn test_queue_ties_break_by_hash() {
        let entries = vec![entry(7, ENABLED_STATUS, 0), entry(5, ENABLED_STATUS, 0)];
        assert_eq!(payment_queue_position(&entries, &test_validator(5)), Some(1));
    }

    #[test]
    fn test_dmn_state_unset_heights() {
        let state: DmnStateWire = serde_json::from_str(
            r#"{"PoSePenalty":0,"PoSeRevivedHeight":-1,"PoSeBanHeight":-1,"lastPaidHeight":1900123}"#,
        )
        .unwrap();

        assert_eq!(state.pose_penalty, Some(0));
        assert_eq!(state.pose_revived_height, None);
        assert_eq!(state.pose_ban_height, None);
        assert_eq!(state.last_paid_height, Some(1_900_123));
    }

    struct FailingCore;

    impl CoreClient for FailingCore {
        fn block_count(&self) -> Result<u64, ChainError> {
            Ok(2_150_000)
        }

        fn masternode_status(&self) -> Result<MasternodeStatus, ChainError> {
            Err(ChainError::Timeout)
        }

        fn masternode_list(&self) -> Result<Vec<MasternodeListEntry>, ChainError> {
            Err(ChainError::Status(500))
        }
    }

    #[test]
    fn test_partial_failure_keeps_what_was_read() {
        let status = collect_core_status(&FailingCore, &test_validator(1));

        assert_eq!(status.core_block_height, Some(2_150_000));
        assert_eq!(status.po_se_penalty, None);
        assert_eq!(status.payment_queue_position, None);
    }
}
