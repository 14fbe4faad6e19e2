//! Validator identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a Tendermint validator address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Length of a Dash ProTxHash in bytes.
pub const PRO_TX_HASH_LEN: usize = 32;

/// Errors from parsing a [`ValidatorId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("Empty validator identifier")]
    Empty,

    #[error("Invalid hex in validator identifier: {0}")]
    InvalidHex(String),

    #[error("Invalid validator identifier length: expected {ADDRESS_LEN} or {PRO_TX_HASH_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Identifier of a validator (its ProTxHash on Tenderdash).
///
/// The identifier is stored as raw bytes, so equality, hashing and ordering
/// never depend on the case the hex was written in. Byte-wise ordering is the
/// same as the ordering of the uppercase hex rendering, which is what the
/// proposer rotation is sorted by.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidatorId(Vec<u8>);

impl ValidatorId {
    /// Create an identifier from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        match bytes.len() {
            0 => Err(IdError::Empty),
            ADDRESS_LEN | PRO_TX_HASH_LEN => Ok(Self(bytes.to_vec())),
            len => Err(IdError::InvalidLength(len)),
        }
    }

    /// Parse an identifier from hex, in either case.
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let bytes = hex::decode(s).map_err(|e| IdError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Canonical uppercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }

    /// Shortened form for log lines.
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        hex[..8].to_string()
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", self.short())
    }
}

impl FromStr for ValidatorId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ValidatorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ValidatorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
