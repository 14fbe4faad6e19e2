//! Shared state for collector handlers.

use crate::cache::TtlCache;
use crate::fleet::FleetStore;
use crate::metrics;
use crate::roster::{Roster, DEFAULT_STALE_AFTER};
use crate::types::FleetSnapshot;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

/// Cache key of the fleet view.
pub const FLEET_CACHE_KEY: &str = "fleet";

/// Shared state for collector handlers.
#[derive(Clone)]
pub struct CollectorState {
    /// Fleet documents.
    pub fleet: Arc<RwLock<FleetStore>>,
    /// Rendered fleet views.
    pub cache: Arc<Mutex<TtlCache<&'static str, FleetSnapshot>>>,
    /// Expected nodes, checked on every fleet view.
    pub roster: Arc<Roster>,
    /// Age after which a roster node's report counts as stale.
    pub stale_after: Duration,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl CollectorState {
    /// Wrap `fleet`, seeding the fleet gauges from what it already holds.
    pub fn new(fleet: FleetStore, cache_ttl: Duration) -> Self {
        metrics::refresh_fleet(&fleet.status_counts(), fleet.members_in_quorum());
        Self {
            fleet: Arc::new(RwLock::new(fleet)),
            cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl))),
            roster: Arc::new(Roster::default()),
            stale_after: DEFAULT_STALE_AFTER,
            start_time: Instant::now(),
        }
    }

    /// Check the fleet view against `roster`.
    pub fn with_roster(mut self, roster: Roster, stale_after: Duration) -> Self {
        self.roster = Arc::new(roster);
        self.stale_after = stale_after;
        self
    }

    /// Drop cached views after a write.
    pub async fn invalidate_views(&self) {
        self.cache.lock().await.invalidate(&FLEET_CACHE_KEY);
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
