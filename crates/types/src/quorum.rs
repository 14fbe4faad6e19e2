//! Quorum set and its fingerprint.

use crate::ValidatorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered set of validators taking turns proposing blocks.
///
/// Order is significant: the proposer at a given height is picked by index,
/// so two quorums with the same members in a different order are different
/// quorums.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuorumSet {
    members: Vec<ValidatorId>,
}

impl QuorumSet {
    /// Create a quorum from its ordered members.
    pub fn new(members: Vec<ValidatorId>) -> Self {
        Self { members }
    }

    /// Ordered members.
    pub fn members(&self) -> &[ValidatorId] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the quorum has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of a validator in the rotation.
    pub fn index_of(&self, validator: &ValidatorId) -> Option<usize> {
        self.members.iter().position(|v| v == validator)
    }

    /// Check if a validator is a member.
    pub fn contains(&self, validator: &ValidatorId) -> bool {
        self.index_of(validator).is_some()
    }

    /// Get the validator at a rotation index.
    pub fn validator_at_index(&self, index: usize) -> Option<&ValidatorId> {
        self.members.get(index)
    }

    /// Round-robin proposer for a height, or `None` for an empty quorum.
    pub fn proposer_for(&self, height: u64) -> Option<&ValidatorId> {
        if self.members.is_empty() {
            return None;
        }
        let index = (height % self.members.len() as u64) as usize;
        self.members.get(index)
    }

    /// Content-addressed fingerprint of the ordered member list.
    pub fn fingerprint(&self) -> QuorumFingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.members.len() as u64).to_le_bytes());
        for member in &self.members {
            let bytes = member.as_bytes();
            hasher.update(&[bytes.len() as u8]);
            hasher.update(bytes);
        }
        QuorumFingerprint(*hasher.finalize().as_bytes())
    }
}

impl FromIterator<ValidatorId> for QuorumSet {
    fn from_iter<I: IntoIterator<Item = ValidatorId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Fingerprint used to detect quorum churn between runs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuorumFingerprint([u8; 32]);

impl QuorumFingerprint {
    /// Lowercase hex rendering, as persisted.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a persisted fingerprint. Returns `None` for anything that is not
    /// 32 bytes of hex.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim()).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for QuorumFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for QuorumFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuorumFingerprint({})", &self.to_hex()[..16])
    }
}
