//! Roster of the nodes the fleet is expected to contain.
//!
//! One node per line, `name,proTxHash`. Blank lines and `#` comments are
//! ignored; malformed lines are logged and skipped.
//!
//! ```text
//! # name,proTxHash
//! mn-01,0f9a...c3
//! mn-02,71be...04
//! ```

use crate::types::{RosterStatus, StoredReport};
use crate::CollectorError;
use mnwatch_types::ValidatorId;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Default age after which a report counts as stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(1_800);

/// One expected node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub pro_tx_hash: ValidatorId,
}

/// Expected fleet membership.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Load a roster file. A missing or unreadable file is an error.
    pub fn load(path: &Path) -> Result<Self, CollectorError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| CollectorError::Roster {
                path: path.to_path_buf(),
                source,
            })?;
        let roster = Self::parse(&contents);
        info!(path = %path.display(), nodes = roster.len(), "Roster loaded");
        Ok(roster)
    }

    /// Parse roster text, skipping lines that do not hold a name and a
    /// valid ProTxHash.
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                match parse_line(line) {
                    Some(entry) => Some(entry),
                    None => {
                        error!(line_number = i + 1, line, "Skipping malformed roster line");
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match every expected node against the stored reports.
    ///
    /// A node is matched by ProTxHash; when several servers report the same
    /// hash the most recent report wins. A node with no report is `missing`;
    /// one whose latest report is older than `stale_after` is `stale`.
    pub fn check(
        &self,
        reports: &BTreeMap<String, StoredReport>,
        now: u64,
        stale_after: Duration,
    ) -> Vec<RosterStatus> {
        self.entries
            .iter()
            .map(|entry| {
                let latest = reports
                    .iter()
                    .filter(|(_, stored)| stored.report.pro_tx_hash == entry.pro_tx_hash)
                    .max_by_key(|(_, stored)| stored.received_at);

                match latest {
                    Some((server_name, stored)) => RosterStatus {
                        name: entry.name.clone(),
                        pro_tx_hash: entry.pro_tx_hash.clone(),
                        server_name: Some(server_name.clone()),
                        last_report_at: Some(stored.received_at),
                        missing: false,
                        stale: now.saturating_sub(stored.received_at) > stale_after.as_secs(),
                    },
                    None => RosterStatus {
                        name: entry.name.clone(),
                        pro_tx_hash: entry.pro_tx_hash.clone(),
                        server_name: None,
                        last_report_at: None,
                        missing: true,
                        stale: false,
                    },
                }
            })
            .collect()
    }
}

fn parse_line(line: &str) -> Option<RosterEntry> {
    let (name, hash) = line.split_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let pro_tx_hash = ValidatorId::from_hex(hash).ok()?;
    Some(RosterEntry {
        name: name.to_string(),
        pro_tx_hash,
    })
}
