//! Agent configuration.
//!
//! Example TOML:
//!
//! ```toml
//! [node]
//! pro_tx_hash = "0f9a...c3"
//! server_name = "mn-01"
//!
//! [chain]
//! rpc_url = "http://127.0.0.1:26657"
//! request_timeout_ms = 5000
//!
//! [quorum]
//! min_quorum_size = 67
//!
//! [state]
//! path = "./mnwatch-state.json"
//!
//! [report]
//! url = "http://collector:8080/report"
//! request_timeout_ms = 10000
//!
//! # Optional: Dash Core health fields
//! [core]
//! rpc_url = "http://127.0.0.1:9998"
//! rpc_user = "dashrpc"
//! rpc_password = "secret"
//!
//! # Optional: public port reachability
//! [ports]
//! p2p_addr = "203.0.113.7:26656"
//! http_addr = "203.0.113.7:443"
//! ```

use mnwatch_audit::{MembershipConfig, DEFAULT_MIN_QUORUM_SIZE};
use mnwatch_types::{IdError, ValidatorId};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that stop the agent before it touches the chain.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid pro_tx_hash {value:?}: {source}")]
    InvalidProTxHash {
        value: String,
        #[source]
        source: IdError,
    },
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node identity
    pub node: NodeConfig,

    /// Chain node RPC
    #[serde(default)]
    pub chain: ChainConfig,

    /// Quorum plausibility
    #[serde(default)]
    pub quorum: QuorumConfig,

    /// Persistent state
    #[serde(default)]
    pub state: StateConfig,

    /// Report delivery
    #[serde(default)]
    pub report: ReportConfig,

    /// Dash Core RPC; Core fields are left unset without it
    #[serde(default)]
    pub core: Option<CoreConfig>,

    /// Public port checks
    #[serde(default)]
    pub ports: PortsConfig,
}

/// Node identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// ProTxHash of the local masternode, hex
    pub pro_tx_hash: String,

    /// Name this node reports under
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

fn default_server_name() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

/// Chain node RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Base URL of the Tenderdash RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_chain_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            request_timeout_ms: default_chain_timeout_ms(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:26657".to_string()
}

fn default_chain_timeout_ms() -> u64 {
    5_000
}

/// Quorum plausibility configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuorumConfig {
    /// Smallest validator set accepted as a real quorum
    #[serde(default = "default_min_quorum_size")]
    pub min_quorum_size: usize,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            min_quorum_size: default_min_quorum_size(),
        }
    }
}

fn default_min_quorum_size() -> usize {
    DEFAULT_MIN_QUORUM_SIZE
}

/// Persistent state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Path of the JSON state file
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(mnwatch_storage::DEFAULT_STATE_FILE)
}

/// Report delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Collector endpoint; when unset the report is only printed
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_report_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_ms: default_report_timeout_ms(),
        }
    }
}

fn default_report_timeout_ms() -> u64 {
    10_000
}

/// Dash Core RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// URL of the Core JSON-RPC endpoint
    #[serde(default = "default_core_rpc_url")]
    pub rpc_url: String,

    /// RPC user; basic auth is sent only when set
    #[serde(default)]
    pub rpc_user: Option<String>,

    #[serde(default)]
    pub rpc_password: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_chain_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl CoreConfig {
    pub fn credentials(&self) -> Option<(String, String)> {
        self.rpc_user.as_ref().map(|user| {
            (user.clone(), self.rpc_password.clone().unwrap_or_default())
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_core_rpc_url() -> String {
    "http://127.0.0.1:9998".to_string()
}

/// Public port check configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PortsConfig {
    /// Platform P2P address, `host:port`
    #[serde(default)]
    pub p2p_addr: Option<String>,

    /// Platform HTTP (DAPI) address, `host:port`
    #[serde(default)]
    pub http_addr: Option<String>,

    /// Connect timeout in milliseconds
    #[serde(default = "default_port_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            p2p_addr: None,
            http_addr: None,
            timeout_ms: default_port_timeout_ms(),
        }
    }
}

fn default_port_timeout_ms() -> u64 {
    3_000
}

impl PortsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The local validator's identifier, normalized.
    pub fn local_validator(&self) -> Result<ValidatorId, ConfigError> {
        ValidatorId::from_hex(&self.node.pro_tx_hash).map_err(|source| {
            ConfigError::InvalidProTxHash {
                value: self.node.pro_tx_hash.clone(),
                source,
            }
        })
    }

    pub fn membership_config(&self) -> MembershipConfig {
        MembershipConfig::default().with_min_quorum_size(self.quorum.min_quorum_size)
    }

    pub fn chain_timeout(&self) -> Duration {
        Duration::from_millis(self.chain.request_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report.request_timeout_ms)
    }
}
