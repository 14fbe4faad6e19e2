//! Route configuration for the collector API.

use crate::handlers::*;
use crate::state::CollectorState;
use axum::{
    routing::{get, post},
    Router,
};

/// Create the full router with all collector routes.
pub fn create_router(state: CollectorState) -> Router {
    Router::new()
        // Liveness (no prefix)
        .route("/health", get(health_handler))
        // Metrics (no prefix, for Prometheus scraping)
        .route("/metrics", get(metrics_handler))
        // Agent writes, on the paths deployed agents already use
        .route("/report", post(report_handler))
        .route("/heartbeat", post(heartbeat_handler))
        .route("/quorumInfo", post(quorum_info_handler))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// Create the `/api/v1` router.
fn api_v1_routes() -> Router<CollectorState> {
    Router::new().route("/fleet", get(fleet_handler))
}
