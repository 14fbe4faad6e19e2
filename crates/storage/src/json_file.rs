//! Atomic JSON documents.

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{error, trace};

/// Write `value` as pretty JSON to `path`, replacing it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let contents = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&contents).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    trace!(path = %path.display(), bytes = contents.len(), "Wrote JSON document");
    Ok(())
}

/// Read a JSON document, falling back to `T::default()` when the file is
/// missing or cannot be parsed.
///
/// A parse failure is logged; the broken file is left in place until the next
/// write replaces it.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StorageError> {
    let contents = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_slice(&contents) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Unreadable JSON document, starting empty");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let value: BTreeMap<String, u64> =
            read_json_or_default(&temp_dir.path().join("absent.json")).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        let value: BTreeMap<String, u64> = [("a".to_string(), 1), ("b".to_string(), 2)].into();

        write_json_atomic(&path, &value).unwrap();
        let read: BTreeMap<String, u64> = read_json_or_default(&path).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let read: Vec<u32> = read_json_or_default(&path).unwrap();
        assert_eq!(read, vec![4]);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        std::fs::write(&path, b"{not json").unwrap();

        let read: Vec<u32> = read_json_or_default(&path).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/doc.json");

        write_json_atomic(&path, &"hello").unwrap();
        assert!(path.exists());
    }
}
