//! Fleet gauges after a restart.
//!
//! Kept in its own test binary: the prometheus registry is process-global and
//! other router tests move the same gauges.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use mnwatch_collector::{create_router, CollectorState, FleetStore};
use mnwatch_types::test_utils::test_validator;
use mnwatch_types::{NodeReport, ProduceStatus};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn report(server_name: &str, status: ProduceStatus, in_quorum: bool) -> NodeReport {
    NodeReport {
        server_name: server_name.to_string(),
        pro_tx_hash: test_validator(1),
        uptime: None,
        uptime_in_seconds: None,
        platform_block_height: Some(5_000),
        in_quorum: Some(in_quorum),
        validators_in_quorum: Some(100),
        quorum_changed: false,
        latest_proposer: None,
        produce_block_status: status,
        last_produced_height: Some(4_900),
        last_should_produce_block_height: Some(4_950),
        core: Default::default(),
    }
}

#[tokio::test]
async fn test_gauges_reflect_persisted_reports_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut store = FleetStore::open(temp_dir.path()).unwrap();
        store.record_report(report("mn-01", ProduceStatus::Error, true), 1).unwrap();
        store.record_report(report("mn-02", ProduceStatus::Error, true), 2).unwrap();
        store.record_report(report("mn-03", ProduceStatus::Ok, false), 3).unwrap();
    }

    // Restart: no report has been posted since.
    let state = CollectorState::new(
        FleetStore::open(temp_dir.path()).unwrap(),
        Duration::from_secs(300),
    );
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("mnwatch_nodes_by_produce_status{status=\"ERROR\"} 2"), "{text}");
    assert!(text.contains("mnwatch_nodes_by_produce_status{status=\"OK\"} 1"), "{text}");
    assert!(text.contains("mnwatch_nodes_by_produce_status{status=\"NO_DATA\"} 0"), "{text}");
    assert!(text.contains("mnwatch_nodes_in_quorum 2"), "{text}");
}
