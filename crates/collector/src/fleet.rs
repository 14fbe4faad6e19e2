//! Fleet documents and their persistence.
//!
//! Three JSON files live in the data directory:
//!
//! - `reports.json`: `{"<serverName>": StoredReport, ...}`
//! - `heartbeats.json`: `{"<serverName>": HeartbeatRecord, ...}`
//! - `quorum_info.json`: the last quorum document, verbatim
//!
//! Each is rewritten atomically on every change. A change is staged as a
//! [`FleetUpdate`] holding the next version of one document; the update is
//! persisted (blocking I/O) and only then applied to the in-memory copy.

use crate::types::{FleetSnapshot, HeartbeatRecord, StoredReport};
use crate::CollectorError;
use mnwatch_storage::{read_json_or_default, write_json_atomic};
use mnwatch_types::{NodeReport, ProduceStatus};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REPORTS_FILE: &str = "reports.json";
pub const HEARTBEATS_FILE: &str = "heartbeats.json";
pub const QUORUM_INFO_FILE: &str = "quorum_info.json";

/// Next version of one fleet document.
#[derive(Debug, Clone)]
enum FleetDocument {
    Reports(BTreeMap<String, StoredReport>),
    Heartbeats(BTreeMap<String, HeartbeatRecord>),
    QuorumInfo(serde_json::Value),
}

/// A staged change to one fleet document, not yet on disk.
#[derive(Debug, Clone)]
pub struct FleetUpdate {
    path: PathBuf,
    document: FleetDocument,
}

impl FleetUpdate {
    /// Write the document to disk. Blocking.
    pub fn persist(&self) -> Result<(), CollectorError> {
        match &self.document {
            FleetDocument::Reports(reports) => write_json_atomic(&self.path, reports)?,
            FleetDocument::Heartbeats(heartbeats) => write_json_atomic(&self.path, heartbeats)?,
            FleetDocument::QuorumInfo(document) => {
                write_json_atomic(&self.path, &Some(document))?
            }
        }
        Ok(())
    }
}

/// In-memory copy of the fleet documents, written through to disk.
#[derive(Debug)]
pub struct FleetStore {
    data_dir: PathBuf,
    reports: BTreeMap<String, StoredReport>,
    heartbeats: BTreeMap<String, HeartbeatRecord>,
    quorum_info: Option<serde_json::Value>,
}

impl FleetStore {
    /// Load the documents from `data_dir`, creating it if needed.
    ///
    /// Unreadable documents start empty.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, CollectorError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|source| CollectorError::DataDir {
            path: data_dir.clone(),
            source,
        })?;

        let reports: BTreeMap<String, StoredReport> =
            read_json_or_default(&data_dir.join(REPORTS_FILE))?;
        let heartbeats: BTreeMap<String, HeartbeatRecord> =
            read_json_or_default(&data_dir.join(HEARTBEATS_FILE))?;
        let quorum_info: Option<serde_json::Value> =
            read_json_or_default(&data_dir.join(QUORUM_INFO_FILE))?;

        info!(
            path = %data_dir.display(),
            reports = reports.len(),
            heartbeats = heartbeats.len(),
            "Fleet store opened"
        );

        Ok(Self {
            data_dir,
            reports,
            heartbeats,
            quorum_info,
        })
    }

    /// Stage the latest report of a server, replacing any previous one.
    pub fn stage_report(&self, report: NodeReport, received_at: u64) -> FleetUpdate {
        let mut next = self.reports.clone();
        next.insert(
            report.server_name.clone(),
            StoredReport {
                received_at,
                report,
            },
        );
        FleetUpdate {
            path: self.data_dir.join(REPORTS_FILE),
            document: FleetDocument::Reports(next),
        }
    }

    /// Stage the latest heartbeat of a server.
    pub fn stage_heartbeat(
        &self,
        server_name: String,
        last_reboot_timestamp: serde_json::Value,
        received_at: u64,
    ) -> FleetUpdate {
        let mut next = self.heartbeats.clone();
        next.insert(
            server_name,
            HeartbeatRecord {
                last_reboot_timestamp,
                received_at,
            },
        );
        FleetUpdate {
            path: self.data_dir.join(HEARTBEATS_FILE),
            document: FleetDocument::Heartbeats(next),
        }
    }

    /// Stage a replacement quorum document.
    pub fn stage_quorum_info(&self, document: serde_json::Value) -> FleetUpdate {
        FleetUpdate {
            path: self.data_dir.join(QUORUM_INFO_FILE),
            document: FleetDocument::QuorumInfo(document),
        }
    }

    /// Adopt an update that has been persisted.
    pub fn apply(&mut self, update: FleetUpdate) {
        match update.document {
            FleetDocument::Reports(reports) => self.reports = reports,
            FleetDocument::Heartbeats(heartbeats) => self.heartbeats = heartbeats,
            FleetDocument::QuorumInfo(document) => self.quorum_info = Some(document),
        }
        debug!(path = %update.path.display(), "Fleet document updated");
    }

    /// Persist and apply `update` on the calling thread.
    pub fn commit(&mut self, update: FleetUpdate) -> Result<(), CollectorError> {
        update.persist()?;
        self.apply(update);
        Ok(())
    }

    pub fn record_report(
        &mut self,
        report: NodeReport,
        received_at: u64,
    ) -> Result<(), CollectorError> {
        self.commit(self.stage_report(report, received_at))
    }

    pub fn record_heartbeat(
        &mut self,
        server_name: String,
        last_reboot_timestamp: serde_json::Value,
        received_at: u64,
    ) -> Result<(), CollectorError> {
        self.commit(self.stage_heartbeat(server_name, last_reboot_timestamp, received_at))
    }

    pub fn set_quorum_info(&mut self, document: serde_json::Value) -> Result<(), CollectorError> {
        self.commit(self.stage_quorum_info(document))
    }

    pub fn report(&self, server_name: &str) -> Option<&StoredReport> {
        self.reports.get(server_name)
    }

    /// Latest report per server.
    pub fn reports(&self) -> &BTreeMap<String, StoredReport> {
        &self.reports
    }

    pub fn heartbeat(&self, server_name: &str) -> Option<&HeartbeatRecord> {
        self.heartbeats.get(server_name)
    }

    /// Number of servers per produce-block status, every status present.
    pub fn status_counts(&self) -> BTreeMap<ProduceStatus, usize> {
        let mut counts: BTreeMap<ProduceStatus, usize> =
            ProduceStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for stored in self.reports.values() {
            *counts.entry(stored.report.produce_block_status).or_default() += 1;
        }
        counts
    }

    /// Number of servers whose last report placed them in the quorum.
    pub fn members_in_quorum(&self) -> usize {
        self.reports
            .values()
            .filter(|stored| stored.report.in_quorum == Some(true))
            .count()
    }

    /// Copy of everything the dashboard shows, without roster checks.
    pub fn snapshot(&self, generated_at: u64) -> FleetSnapshot {
        FleetSnapshot {
            generated_at,
            reports: self.reports.clone(),
            heartbeats: self.heartbeats.clone(),
            quorum_info: self.quorum_info.clone(),
            status_counts: self
                .status_counts()
                .into_iter()
                .map(|(status, n)| (status.as_str().to_string(), n))
                .collect(),
            roster: Vec::new(),
        }
    }
}
