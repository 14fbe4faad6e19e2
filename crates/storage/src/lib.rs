//! # File Storage
//!
//! Durable storage on the local filesystem.
//!
//! - [`FileStateStore`]: the agent's key-value state, one JSON object per file
//! - [`write_json_atomic`] / [`read_json_or_default`]: whole-document
//!   persistence used by the collector
//!
//! Every write goes to a temporary file in the target directory, is synced,
//! then renamed over the target, so readers see either the old or the new
//! document. All operations are blocking.

mod json_file;
mod state_file;

pub use json_file::{read_json_or_default, write_json_atomic};
pub use state_file::{FileStateStore, DEFAULT_STATE_FILE};

use std::path::PathBuf;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
