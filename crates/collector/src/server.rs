//! Collector server.

use crate::fleet::FleetStore;
use crate::roster::Roster;
use crate::routes::create_router;
use crate::state::CollectorState;
use crate::CollectorError;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Configuration for the collector server.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// Directory holding the fleet documents.
    pub data_dir: PathBuf,
    /// How long a rendered fleet view is served from cache.
    pub cache_ttl: Duration,
    /// Roster of expected nodes (`name,proTxHash` per line), if any.
    pub roster_path: Option<PathBuf>,
    /// Age after which a roster node's report counts as stale.
    pub stale_after: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./data"),
            cache_ttl: crate::cache::DEFAULT_CACHE_TTL,
            roster_path: None,
            stale_after: crate::roster::DEFAULT_STALE_AFTER,
        }
    }
}

/// Collector HTTP server.
pub struct CollectorServer {
    config: CollectorConfig,
    state: CollectorState,
}

impl CollectorServer {
    /// Open the fleet store, load the roster and prepare the server.
    pub fn new(config: CollectorConfig) -> Result<Self, CollectorError> {
        let fleet = FleetStore::open(&config.data_dir)?;
        let roster = match &config.roster_path {
            Some(path) => Roster::load(path)?,
            None => Roster::default(),
        };
        let state =
            CollectorState::new(fleet, config.cache_ttl).with_roster(roster, config.stale_after);
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), CollectorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.listen_addr;
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(CollectorError::Bind)?;
        info!(addr = %addr, data_dir = %self.config.data_dir.display(), "Collector listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(CollectorError::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CollectorConfig::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_server_creation_creates_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("fleet");
        let config = CollectorConfig {
            data_dir: data_dir.clone(),
            ..CollectorConfig::default()
        };

        assert!(CollectorServer::new(config).is_ok());
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_missing_roster_fails_startup() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig {
            data_dir: temp_dir.path().to_path_buf(),
            roster_path: Some(temp_dir.path().join("validators.txt")),
            ..CollectorConfig::default()
        };

        assert!(matches!(
            CollectorServer::new(config),
            Err(CollectorError::Roster { .. })
        ));
    }
}
