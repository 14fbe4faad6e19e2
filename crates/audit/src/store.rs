//! Key-value state persisted between agent runs.

use mnwatch_types::ProductionState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Key for the last height the local validator proposed.
pub const LAST_PRODUCED_HEIGHT: &str = "lastProducedHeight";

/// Key for the last height the local validator was expected to propose.
pub const LAST_EXPECTED_HEIGHT: &str = "lastShouldProduceBlockHeight";

/// Key for the fingerprint of the quorum seen on the previous run.
pub const QUORUM_HASH: &str = "quorumHash";

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Integer(u64),
    Text(String),
}

impl StateValue {
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }
}

/// Error type for state store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read state: {0}")]
    Read(String),

    #[error("Failed to write state: {0}")]
    Write(String),
}

/// Durable key-value store injected into the membership evaluator and the
/// auditor.
///
/// `set` must be durable when it returns: the auditor relies on each write
/// surviving a crash that happens right after it.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<StateValue>, StoreError>;

    fn set(&mut self, key: &str, value: StateValue) -> Result<(), StoreError>;
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: BTreeMap<String, StateValue>,
    writes: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<StateValue>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: StateValue) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }
}

/// Read an integer setting, treating unreadable or mistyped values as unset.
fn read_height<S: StateStore + ?Sized>(store: &S, key: &str) -> Option<u64> {
    match store.get(key) {
        Ok(Some(StateValue::Integer(v))) => Some(v),
        Ok(Some(other)) => {
            warn!(key, value = ?other, "Discarding corrupt state value");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read state, treating as unset");
            None
        }
    }
}

/// Load the production state.
///
/// Never fails: a value that cannot be read resets that field to unset, which
/// puts the audit back into its initial no-data state instead of inventing
/// heights.
pub fn load_production_state<S: StateStore + ?Sized>(store: &S) -> ProductionState {
    ProductionState {
        last_produced_height: read_height(store, LAST_PRODUCED_HEIGHT),
        last_expected_height: read_height(store, LAST_EXPECTED_HEIGHT),
    }
}

/// Persist the set fields of a production state.
pub fn save_production_state<S: StateStore + ?Sized>(
    store: &mut S,
    state: &ProductionState,
) -> Result<(), StoreError> {
    if let Some(height) = state.last_produced_height {
        store.set(LAST_PRODUCED_HEIGHT, StateValue::Integer(height))?;
    }
    if let Some(height) = state.last_expected_height {
        store.set(LAST_EXPECTED_HEIGHT, StateValue::Integer(height))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_loads_initial_state() {
        let store = MemoryStateStore::new();
        assert_eq!(load_production_state(&store), ProductionState::default());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStateStore::new();
        let state = ProductionState {
            last_produced_height: Some(1_000),
            last_expected_height: Some(1_067),
        };

        save_production_state(&mut store, &state).unwrap();
        assert_eq!(load_production_state(&store), state);
    }

    #[test]
    fn test_corrupt_value_resets_field() {
        let mut store = MemoryStateStore::new();
        store
            .set(LAST_PRODUCED_HEIGHT, StateValue::Text("garbage".into()))
            .unwrap();
        store
            .set(LAST_EXPECTED_HEIGHT, StateValue::Integer(7))
            .unwrap();

        let state = load_production_state(&store);
        assert_eq!(state.last_produced_height, None);
        assert_eq!(state.last_expected_height, Some(7));
    }

    #[test]
    fn test_unset_fields_are_not_written() {
        let mut store = MemoryStateStore::new();
        save_production_state(&mut store, &ProductionState::default()).unwrap();
        assert_eq!(store.writes(), 0);
    }
}
