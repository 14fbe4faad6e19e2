//! Core types for masternode fleet monitoring.
//!
//! This crate provides the types shared by the agent, the audit logic and the
//! collector:
//!
//! - **Identifiers**: [`ValidatorId`], case-normalized and byte-ordered
//! - **Quorum**: [`QuorumSet`] and its churn [`QuorumFingerprint`]
//! - **Production**: [`ProductionState`], [`ProduceStatus`], [`Membership`]
//! - **Reporting**: [`NodeReport`] and its [`CoreStatus`], the payload posted
//!   to the collector
//!
//! It does not depend on any other workspace crate.

mod identifiers;
mod production;
mod quorum;
mod report;

pub use identifiers::{IdError, ValidatorId, ADDRESS_LEN, PRO_TX_HASH_LEN};
pub use production::{Membership, ProduceStatus, ProductionState};
pub use quorum::{QuorumFingerprint, QuorumSet};
pub use report::{format_uptime, CoreStatus, NodeReport, PortState};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a test validator from a seed byte. Higher seeds sort later.
    pub fn test_validator(seed: u8) -> ValidatorId {
        ValidatorId::from_bytes(&[seed; PRO_TX_HASH_LEN]).expect("valid length")
    }

    /// Create a quorum of `size` validators with seeds `1..=size`, in
    /// ascending order.
    pub fn test_quorum(size: u8) -> QuorumSet {
        (1..=size).map(test_validator).collect()
    }
}
