//! Central collector for masternode fleet reports.
//!
//! # Agent writes
//!
//! - `POST /report` - Node report from `mnwatch-agent`
//! - `POST /heartbeat` - `{serverName, lastRebootTimestamp}`
//! - `POST /quorumInfo` - Quorum document, stored verbatim
//!
//! # Reads
//!
//! - `GET /health` - Liveness check
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/v1/fleet` - Reports, heartbeats, quorum info and roster
//!   checks, cached
//!
//! # Example
//!
//! ```no_run
//! use mnwatch_collector::{CollectorConfig, CollectorServer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = CollectorServer::new(CollectorConfig::default())?;
//! server.serve_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod fleet;
mod handlers;
pub mod metrics;
pub mod roster;
mod routes;
mod server;
mod state;
pub mod types;

pub use cache::{TtlCache, DEFAULT_CACHE_TTL};
pub use fleet::{FleetStore, FleetUpdate};
pub use roster::{Roster, RosterEntry, DEFAULT_STALE_AFTER};
pub use routes::create_router;
pub use server::{CollectorConfig, CollectorServer};
pub use state::CollectorState;

use std::path::PathBuf;

/// Errors from the collector.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read roster {path}: {source}")]
    Roster {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] mnwatch_storage::StorageError),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
