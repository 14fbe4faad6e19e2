//! Agent state as a single JSON object on disk.

use crate::json_file::{read_json_or_default, write_json_atomic};
use crate::StorageError;
use mnwatch_audit::{StateStore, StateValue, StoreError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default path of the agent state file.
pub const DEFAULT_STATE_FILE: &str = "./mnwatch-state.json";

/// [`StateStore`] backed by a JSON file.
///
/// File format: `{"<key>": <integer or string>, ...}`. The whole file is
/// rewritten atomically on every `set`, so a value is durable once `set`
/// returns.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    values: BTreeMap<String, StateValue>,
}

impl FileStateStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty. So does a corrupt one, after an error log:
    /// the audit then restarts from its initial no-data state.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values: BTreeMap<String, StateValue> = read_json_or_default(&path)?;
        debug!(path = %path.display(), keys = values.len(), "Opened state file");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<StateValue>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: StateValue) -> Result<(), StoreError> {
        let mut next = self.values.clone();
        next.insert(key.to_string(), value);
        write_json_atomic(&self.path, &next).map_err(|e| StoreError::Write(e.to_string()))?;
        self.values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let mut store = FileStateStore::open(&path).unwrap();
        store.set("lastProducedHeight", StateValue::Integer(42)).unwrap();
        store
            .set("quorumHash", StateValue::Text("abcd".into()))
            .unwrap();
        drop(store);

        let store = FileStateStore::open(&path).unwrap();
        assert_eq!(
            store.get("lastProducedHeight").unwrap(),
            Some(StateValue::Integer(42))
        );
        assert_eq!(
            store.get("quorumHash").unwrap(),
            Some(StateValue::Text("abcd".into()))
        );
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_file_format_is_flat_json_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let mut store = FileStateStore::open(&path).unwrap();
        store.set("lastShouldProduceBlockHeight", StateValue::Integer(7)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "lastShouldProduceBlockHeight": 7 }));
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "lastProducedHeight=12").unwrap();

        let store = FileStateStore::open(&path).unwrap();
        assert_eq!(store.get("lastProducedHeight").unwrap(), None);
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = temp_dir.path().join("state.json");
        std::fs::create_dir(&path).unwrap();

        let mut store = FileStateStore {
            path,
            values: BTreeMap::new(),
        };
        assert!(store.set("k", StateValue::Integer(1)).is_err());
        assert_eq!(store.get("k").unwrap(), None);
    }
}
