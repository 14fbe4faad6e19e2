//! HTTP request handlers for the collector API.

use crate::fleet::{FleetStore, FleetUpdate};
use crate::metrics;
use crate::state::{unix_now, CollectorState, FLEET_CACHE_KEY};
use crate::CollectorError;
use crate::types::*;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mnwatch_types::NodeReport;
use prometheus::{Encoder, TextEncoder};
use tokio::sync::RwLockWriteGuard;
use tracing::{debug, error, info, warn};

const INVALID_DATA: &str = "Invalid data provided";

fn rejected(endpoint: &str, reason: &str) -> (StatusCode, Json<WriteResponse>) {
    warn!(endpoint, reason, "Rejected write");
    metrics::record_rejected(endpoint);
    (
        StatusCode::BAD_REQUEST,
        Json(WriteResponse::error(INVALID_DATA)),
    )
}

fn storage_failed(endpoint: &str, e: &CollectorError) -> (StatusCode, Json<WriteResponse>) {
    error!(endpoint, error = %e, "Failed to persist write");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(WriteResponse::error("Failed to save data")),
    )
}

/// Stage a change under the fleet write lock, persist it on the blocking
/// pool, then apply it. The lock is held throughout so concurrent writes land
/// in order; the guard is returned for follow-up reads.
async fn commit_update<F>(
    state: &CollectorState,
    stage: F,
) -> Result<RwLockWriteGuard<'_, FleetStore>, CollectorError>
where
    F: FnOnce(&FleetStore) -> FleetUpdate,
{
    let mut fleet = state.fleet.write().await;
    let update = stage(&fleet);
    let update = tokio::task::spawn_blocking(move || update.persist().map(|()| update)).await??;
    fleet.apply(update);
    Ok(fleet)
}

// ═══════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /health` - liveness check.
pub async fn health_handler(State(state): State<CollectorState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so every metric is exported from the first scrape.
    let _ = metrics::metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = ?e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        )
            .into_response();
    }

    (
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buffer,
    )
        .into_response()
}

// ═══════════════════════════════════════════════════════════════════════════
// Write Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `POST /report` - store a node report.
pub async fn report_handler(
    State(state): State<CollectorState>,
    payload: Result<Json<NodeReport>, JsonRejection>,
) -> impl IntoResponse {
    let Json(report) = match payload {
        Ok(report) => report,
        Err(e) => return rejected("report", &e.body_text()),
    };
    if report.server_name.trim().is_empty() {
        return rejected("report", "empty serverName");
    }

    let server_name = report.server_name.clone();
    let status = report.produce_block_status;
    match commit_update(&state, |fleet| fleet.stage_report(report, unix_now())).await {
        Ok(fleet) => {
            metrics::record_report();
            metrics::refresh_fleet(&fleet.status_counts(), fleet.members_in_quorum());
        }
        Err(e) => return storage_failed("report", &e),
    }
    state.invalidate_views().await;

    info!(%server_name, %status, "Report received");
    (
        StatusCode::OK,
        Json(WriteResponse::success("Report saved successfully")),
    )
}

/// Handler for `POST /heartbeat` - store a server heartbeat.
pub async fn heartbeat_handler(
    State(state): State<CollectorState>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(e) => return rejected("heartbeat", &e.body_text()),
    };

    let server_name = match request.server_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return rejected("heartbeat", "missing serverName"),
    };
    let timestamp = match request.last_reboot_timestamp {
        Some(serde_json::Value::Null) | None => {
            return rejected("heartbeat", "missing lastRebootTimestamp")
        }
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
            return rejected("heartbeat", "missing lastRebootTimestamp")
        }
        Some(ts) => ts,
    };

    let name = server_name.clone();
    if let Err(e) = commit_update(&state, |fleet| {
        fleet.stage_heartbeat(name, timestamp, unix_now())
    })
    .await
    {
        return storage_failed("heartbeat", &e);
    }
    metrics::record_heartbeat();
    state.invalidate_views().await;

    debug!(%server_name, "Heartbeat received");
    (
        StatusCode::OK,
        Json(WriteResponse::success("Heartbeat data saved successfully")),
    )
}

/// Handler for `POST /quorumInfo` - store the quorum document.
pub async fn quorum_info_handler(
    State(state): State<CollectorState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let document = match payload {
        Ok(Json(serde_json::Value::Null)) => return rejected("quorumInfo", "null document"),
        Ok(Json(document)) => document,
        Err(e) => return rejected("quorumInfo", &e.body_text()),
    };

    if let Err(e) = commit_update(&state, |fleet| fleet.stage_quorum_info(document)).await {
        return storage_failed("quorumInfo", &e);
    }
    metrics::record_quorum_info();
    state.invalidate_views().await;

    (
        StatusCode::OK,
        Json(WriteResponse::success("Quorum info saved successfully")),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// Fleet View
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /api/v1/fleet` - fleet snapshot, cached.
pub async fn fleet_handler(State(state): State<CollectorState>) -> impl IntoResponse {
    let mut cache = state.cache.lock().await;
    if let Some(snapshot) = cache.get(&FLEET_CACHE_KEY) {
        return Json(snapshot.clone());
    }

    let now = unix_now();
    let snapshot = {
        let fleet = state.fleet.read().await;
        let mut snapshot = fleet.snapshot(now);
        snapshot.roster = state.roster.check(fleet.reports(), now, state.stale_after);
        snapshot
    };
    cache.insert(FLEET_CACHE_KEY, snapshot.clone());
    Json(snapshot)
}
