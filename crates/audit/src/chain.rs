//! Query interface to the chain node.

use mnwatch_types::{QuorumSet, ValidatorId};

/// Errors returned by a [`ChainClient`].
///
/// All of these are transient from the audit's point of view: the cycle that
/// hit one is abandoned and the next scheduled run tries again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Request to chain node failed: {0}")]
    Transport(String),

    #[error("Request to chain node timed out")]
    Timeout,

    #[error("Chain node returned HTTP {0}")]
    Status(u16),

    #[error("Malformed response from chain node: {0}")]
    Malformed(String),

    #[error("Chain node RPC error: {0}")]
    Rpc(String),

    #[error("No block at height {0}")]
    MissingBlock(u64),
}

/// Read-only view of the chain, as needed by the membership check and the
/// block-production audit.
///
/// Implementations are expected to enforce their own per-request timeout.
pub trait ChainClient {
    /// Ordered validator set of the current consensus round.
    fn current_round_validators(&self) -> Result<QuorumSet, ChainError>;

    /// Proposer of the most recent block.
    fn current_proposer(&self) -> Result<ValidatorId, ChainError>;

    /// Proposer of the block at `height`.
    fn proposer_at_height(&self, height: u64) -> Result<ValidatorId, ChainError>;

    /// Height of the chain head.
    fn latest_height(&self) -> Result<u64, ChainError>;
}

impl<C: ChainClient + ?Sized> ChainClient for &C {
    fn current_round_validators(&self) -> Result<QuorumSet, ChainError> {
        (**self).current_round_validators()
    }

    fn current_proposer(&self) -> Result<ValidatorId, ChainError> {
        (**self).current_proposer()
    }

    fn proposer_at_height(&self, height: u64) -> Result<ValidatorId, ChainError> {
        (**self).proposer_at_height(height)
    }

    fn latest_height(&self) -> Result<u64, ChainError> {
        (**self).latest_height()
    }
}
