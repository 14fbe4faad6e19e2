//! Collector metrics using the native Prometheus client.

use mnwatch_types::ProduceStatus;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_int_gauge_vec, Counter,
    CounterVec, Gauge, IntGaugeVec,
};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Fleet-level metrics.
pub struct Metrics {
    pub reports_received: Counter,
    pub heartbeats_received: Counter,
    pub quorum_info_received: Counter,
    /// Rejected writes, by endpoint.
    pub requests_rejected: CounterVec,
    /// Reporting nodes per produce-block status.
    pub nodes_by_status: IntGaugeVec,
    /// Nodes whose last report said they were in the quorum.
    pub nodes_in_quorum: Gauge,
}

impl Metrics {
    fn new() -> Self {
        Self {
            reports_received: register_counter!(
                "mnwatch_reports_received_total",
                "Total number of node reports accepted"
            )
            .expect("metric registration"),

            heartbeats_received: register_counter!(
                "mnwatch_heartbeats_received_total",
                "Total number of heartbeats accepted"
            )
            .expect("metric registration"),

            quorum_info_received: register_counter!(
                "mnwatch_quorum_info_received_total",
                "Total number of quorum documents accepted"
            )
            .expect("metric registration"),

            requests_rejected: register_counter_vec!(
                "mnwatch_requests_rejected_total",
                "Writes rejected as invalid",
                &["endpoint"]
            )
            .expect("metric registration"),

            nodes_by_status: register_int_gauge_vec!(
                "mnwatch_nodes_by_produce_status",
                "Reporting nodes per produce-block status",
                &["status"]
            )
            .expect("metric registration"),

            nodes_in_quorum: register_gauge!(
                "mnwatch_nodes_in_quorum",
                "Reporting nodes that are members of the active quorum"
            )
            .expect("metric registration"),
        }
    }
}

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Record an accepted report.
pub fn record_report() {
    metrics().reports_received.inc();
}

/// Set the fleet gauges from the stored reports.
pub fn refresh_fleet(status_counts: &BTreeMap<ProduceStatus, usize>, in_quorum: usize) {
    let m = metrics();
    for status in ProduceStatus::ALL {
        let n = status_counts.get(&status).copied().unwrap_or(0);
        m.nodes_by_status
            .with_label_values(&[status.as_str()])
            .set(n as i64);
    }
    m.nodes_in_quorum.set(in_quorum as f64);
}

/// Record an accepted heartbeat.
pub fn record_heartbeat() {
    metrics().heartbeats_received.inc();
}

/// Record an accepted quorum document.
pub fn record_quorum_info() {
    metrics().quorum_info_received.inc();
}

/// Record a rejected write.
pub fn record_rejected(endpoint: &str) {
    metrics()
        .requests_rejected
        .with_label_values(&[endpoint])
        .inc();
}
