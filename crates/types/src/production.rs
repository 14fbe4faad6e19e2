//! Block-production state carried between agent runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Heights remembered across invocations.
///
/// Both fields are unset on the first run. `last_produced_height` is only ever
/// set to a height whose proposer was observed to be the local validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionState {
    /// Last height the local validator is known to have proposed.
    pub last_produced_height: Option<u64>,
    /// Last height the local validator was expected to propose (or the last
    /// height queried while looking for it).
    pub last_expected_height: Option<u64>,
}

impl ProductionState {
    /// State after observing the local validator as proposer at `height`.
    pub fn produced_at(height: u64) -> Self {
        Self {
            last_produced_height: Some(height),
            last_expected_height: Some(height),
        }
    }

    /// Whether any production has been observed yet.
    pub fn has_history(&self) -> bool {
        self.last_produced_height.is_some()
    }

    /// Status implied by the stored heights alone.
    pub fn derived_status(&self) -> ProduceStatus {
        match (self.last_produced_height, self.last_expected_height) {
            (None, _) => ProduceStatus::NoData,
            (Some(produced), Some(expected)) if produced != expected => ProduceStatus::Error,
            (Some(_), _) => ProduceStatus::Ok,
        }
    }
}

/// Outcome of a block-production audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProduceStatus {
    /// The validator produced its expected block.
    #[serde(rename = "OK")]
    Ok,
    /// The validator missed its expected turn.
    #[serde(rename = "ERROR")]
    Error,
    /// Nothing to judge against yet.
    #[serde(rename = "NO_DATA")]
    NoData,
}

impl ProduceStatus {
    /// All statuses, for metric label initialisation.
    pub const ALL: [ProduceStatus; 3] = [Self::Ok, Self::Error, Self::NoData];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for ProduceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quorum membership of the local validator.
///
/// `Unknown` is distinct from `NotMember`: it means the quorum could not be
/// read (or was implausibly small), so nothing should be concluded from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
    Unknown,
}

impl Membership {
    /// Tri-state as reported on the wire (`null` for unknown).
    pub fn as_option(&self) -> Option<bool> {
        match self {
            Self::Member => Some(true),
            Self::NotMember => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member)
    }
}
