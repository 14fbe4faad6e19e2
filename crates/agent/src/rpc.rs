//! Tenderdash HTTP RPC client.
//!
//! Implements [`ChainClient`] over the node's JSON RPC endpoints:
//!
//! | call | endpoint | field |
//! |---|---|---|
//! | `current_round_validators` | `GET /dump_consensus_state` | `round_state.validators.validators[].pro_tx_hash` |
//! | `latest_height` | `GET /status` | `sync_info.latest_block_height` |
//! | `current_proposer` | `GET /block` | `block.header.proposer_pro_tx_hash` |
//! | `proposer_at_height` | `GET /block?height=N` | `block.header.proposer_pro_tx_hash` |
//!
//! Responses are accepted with or without the JSON-RPC `result` envelope, and
//! heights as JSON strings or numbers.

use mnwatch_audit::{ChainClient, ChainError};
use mnwatch_types::{QuorumSet, ValidatorId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::trace;

/// Blocking client for a Tenderdash node.
#[derive(Debug, Clone)]
pub struct TenderdashRpcClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl TenderdashRpcClient {
    /// Create a client; every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%url, "Chain RPC request");

        let response = self.http.get(&url).send().map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }

        let body = response.bytes().map_err(map_transport)?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)
            .map_err(|e| ChainError::Malformed(format!("{path}: {e}")))?;
        envelope.into_result(path)
    }

    fn block_proposer(&self, path: &str) -> Result<ValidatorId, ChainError> {
        let block: BlockResponse = self.get(path)?;
        parse_id(&block.block.header.proposer_pro_tx_hash)
    }
}

impl ChainClient for TenderdashRpcClient {
    fn current_round_validators(&self) -> Result<QuorumSet, ChainError> {
        let dump: ConsensusStateResponse = self.get("/dump_consensus_state")?;
        dump.round_state
            .validators
            .validators
            .iter()
            .map(|v| parse_id(&v.pro_tx_hash))
            .collect::<Result<Vec<_>, _>>()
            .map(QuorumSet::new)
    }

    fn current_proposer(&self) -> Result<ValidatorId, ChainError> {
        self.block_proposer("/block")
    }

    fn proposer_at_height(&self, height: u64) -> Result<ValidatorId, ChainError> {
        match self.block_proposer(&format!("/block?height={height}")) {
            // Tenderdash answers a height it does not have with an RPC error.
            Err(ChainError::Rpc(_)) => Err(ChainError::MissingBlock(height)),
            other => other,
        }
    }

    fn latest_height(&self) -> Result<u64, ChainError> {
        let status: StatusResponse = self.get("/status")?;
        Ok(status.sync_info.latest_block_height)
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
    ValidatorId::from_hex(hex).map_err(|e| ChainError::Malformed(format!("pro_tx_hash {hex:?}: {e}")))
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Result { result: T },
    Error { error: RpcError },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_result(self, path: &str) -> Result<T, ChainError> {
        match self {
            Self::Result { result } | Self::Bare(result) => Ok(result),
            Self::Error { error } => Err(ChainError::Rpc(format!(
                "{path}: {} {}",
                error.message,
                error.data.unwrap_or_default()
            ))),
        }
    }
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct ConsensusStateResponse {
    round_state: RoundState,
}

#[derive(Deserialize)]
struct RoundState {
    validators: ValidatorSetDump,
}

#[derive(Deserialize)]
struct ValidatorSetDump {
    validators: Vec<ValidatorDump>,
}

#[derive(Deserialize)]
struct ValidatorDump {
    pro_tx_hash: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    #[serde(deserialize_with = "height_from_str_or_num")]
    latest_block_height: u64,
}

#[derive(Deserialize)]
struct BlockResponse {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
    proposer_pro_tx_hash: String,
}

fn height_from_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Height {
        Num(u64),
        Str(String),
    }

    match Height::deserialize(deserializer)? {
        Height::Num(h) => Ok(h),
        Height::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
