//! Report assembly and delivery.

use mnwatch_audit::CycleOutcome;
use mnwatch_types::{format_uptime, CoreStatus, NodeReport, ValidatorId};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Where the kernel publishes seconds since boot.
pub const PROC_UPTIME: &str = "/proc/uptime";

/// Error type for report delivery.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to send report: {0}")]
    Transport(String),

    #[error("Collector rejected report with HTTP {0}")]
    Status(u16),
}

/// Build the report for one cycle.
pub fn assemble_report(
    server_name: &str,
    local: &ValidatorId,
    outcome: &CycleOutcome,
    uptime_seconds: Option<u64>,
    core: CoreStatus,
) -> NodeReport {
    NodeReport {
        server_name: server_name.to_string(),
        pro_tx_hash: local.clone(),
        uptime: uptime_seconds.map(format_uptime),
        uptime_in_seconds: uptime_seconds,
        platform_block_height: outcome.latest_height,
        in_quorum: outcome.membership.membership.as_option(),
        validators_in_quorum: outcome.membership.validators_in_quorum,
        quorum_changed: outcome.membership.quorum_changed,
        latest_proposer: outcome.latest_proposer.clone(),
        produce_block_status: outcome.status,
        last_produced_height: outcome.state.last_produced_height,
        last_should_produce_block_height: outcome.state.last_expected_height,
        core,
    }
}

/// Whole seconds since boot, read from `path` (normally [`PROC_UPTIME`]).
pub fn read_uptime(path: &Path) -> Option<u64> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_proc_uptime(&contents),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Uptime unavailable");
            None
        }
    }
}

/// Parse the first field of `/proc/uptime` (`"350735.47 234388.90"`).
fn parse_proc_uptime(contents: &str) -> Option<u64> {
    let secs: f64 = contents.split_whitespace().next()?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| secs as u64)
}

/// Posts reports to the collector.
#[derive(Debug, Clone)]
pub struct ReportPoster {
    url: String,
    http: reqwest::blocking::Client,
}

impl ReportPoster {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn post(&self, report: &NodeReport) -> Result<(), ReportError> {
        let response = self
            .http
            .post(&self.url)
            .json(report)
            .send()
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }

        info!(url = %self.url, status = %report.produce_block_status, "Report delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnwatch_audit::{AuditStep, MembershipReport};
    use mnwatch_types::test_utils::test_validator;
    use mnwatch_types::{Membership, ProduceStatus, ProductionState};

    fn outcome(membership: Membership) -> CycleOutcome {
        CycleOutcome {
            membership: MembershipReport {
                membership,
                quorum_changed: false,
                validators_in_quorum: Some(100),
                fingerprint: None,
            },
            latest_height: Some(5_000),
            latest_proposer: Some(test_validator(9)),
            state: ProductionState {
                last_produced_height: Some(4_950),
                last_expected_height: Some(4_980),
            },
            step: Some(AuditStep::FastPath),
            status: ProduceStatus::Error,
            failure: None,
        }
    }

    #[test]
    fn test_parse_proc_uptime() {
        assert_eq!(parse_proc_uptime("350735.47 234388.90\n"), Some(350_735));
        assert_eq!(parse_proc_uptime(""), None);
        assert_eq!(parse_proc_uptime("abc 1.0"), None);
    }

    #[test]
    fn test_read_uptime_missing_file() {
        assert_eq!(read_uptime(Path::new("/nonexistent/uptime")), None);
    }

    #[test]
    fn test_assemble_report() {
        let report = assemble_report("mn-01", &test_validator(3), &outcome(Membership::Member), Some(90_061), CoreStatus::default());

        assert_eq!(report.server_name, "mn-01");
        assert_eq!(report.uptime.as_deref(), Some("1d 1h 1m 1s"));
        assert_eq!(report.in_quorum, Some(true));
        assert_eq!(report.platform_block_height, Some(5_000));
        assert_eq!(report.produce_block_status, ProduceStatus::Error);
        assert_eq!(report.last_produced_height, Some(4_950));
        assert_eq!(report.last_should_produce_block_height, Some(4_980));
    }

    #[test]
    fn test_unknown_membership_serializes_as_null() {
        let report = assemble_report("mn-01", &test_validator(3), &outcome(Membership::Unknown), None, CoreStatus::default());
        let value = serde_json::to_value(&report).unwrap();

        assert!(value["inQuorum"].is_null());
        assert!(value["uptime"].is_null());
        assert!(value["coreBlockHeight"].is_null());
    }

    #[test]
    fn test_core_fields_are_flattened() {
        let core = CoreStatus {
            core_block_height: Some(2_150_000),
            po_se_penalty: Some(0),
            payment_queue_position: Some(12),
            p2p_port_state: Some(mnwatch_types::PortState::Open),
            ..CoreStatus::default()
        };
        let report = assemble_report("mn-01", &test_validator(3), &outcome(Membership::Member), None, core);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["coreBlockHeight"], 2_150_000);
        assert_eq!(value["poSePenalty"], 0);
        assert_eq!(value["paymentQueuePosition"], 12);
        assert_eq!(value["p2pPortState"], "OPEN");
        assert!(value["httpPortState"].is_null());
    }
}
