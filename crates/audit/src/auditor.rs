//! Block-production auditor.
//!
//! Decides whether the local validator proposed the block it was expected to
//! propose. Proposal turns rotate round-robin over the quorum, and the quorum
//! is ordered by identifier, so within one rotation the proposer identifiers
//! grow with height. When the most recent proposer sorts after us, our turn
//! in the current rotation has already come:
//!
//! ```text
//! quorum:   A   B   C   D   E          local = C (index 2)
//! height:  96  97  98  99  100         latest proposer = E (index 4)
//!
//! search_start = (100 - 4) + 2 = 98    search_end = 100 - 1 = 99
//! ```
//!
//! The auditor binary-searches `[search_start, search_end]` for a block we
//! proposed, comparing each queried proposer with our identifier. Every lookup
//! is persisted as the last expected height before the next one, so an
//! interrupted search resumes from real data on the next run.

use crate::chain::{ChainClient, ChainError};
use crate::store::{StateStore, StateValue, StoreError, LAST_EXPECTED_HEIGHT, LAST_PRODUCED_HEIGHT};
use mnwatch_types::{Membership, ProduceStatus, ProductionState, QuorumSet, ValidatorId};
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};

/// Inputs of one audit cycle.
#[derive(Debug, Clone, Copy)]
pub struct AuditInput<'a> {
    pub local: &'a ValidatorId,
    pub quorum: &'a QuorumSet,
    pub latest_height: u64,
    pub latest_proposer: &'a ValidatorId,
    pub membership: Membership,
    pub quorum_changed: bool,
}

/// Which branch of the audit decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStep {
    /// The local validator is not in the quorum.
    NotInQuorum,
    /// Membership could not be determined this cycle.
    MembershipUnknown,
    /// The local validator proposed the latest block.
    JustProduced,
    /// No production has been observed yet.
    NoHistory,
    /// The quorum changed since the last run; offsets are meaningless.
    QuorumChanged,
    /// The latest proposer sorts before the local validator.
    ProposerBelowLocal,
    /// The latest proposer is not in the fetched quorum.
    ProposerNotInQuorum,
    /// The head height overflows the rotation arithmetic.
    HeightOutOfRange,
    /// The expected height was already covered by an earlier run.
    ///
    /// Known false positive: after a search interrupted between lookups, the
    /// last queried height counts as expected, so the next run can report
    /// ERROR even though the validator did propose within the range.
    FastPath,
    /// The search range was empty.
    EmptyRange,
    /// A binary search was performed.
    Searched { lookups: u32, found: bool },
}

/// Result of one audit cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// Production state after the audit (already persisted).
    pub state: ProductionState,
    /// Status decided by this audit, or `None` when the cycle was skipped.
    pub status: Option<ProduceStatus>,
    pub step: AuditStep,
}

impl AuditReport {
    fn skipped(state: ProductionState, step: AuditStep) -> Self {
        Self {
            state,
            status: None,
            step,
        }
    }

    /// Status decided by this audit, falling back to what the stored heights
    /// imply when the cycle was skipped.
    pub fn effective_status(&self) -> ProduceStatus {
        self.status
            .unwrap_or_else(|| self.state.derived_status())
    }
}

/// Errors that abort an audit cycle.
///
/// Whatever was persisted before the error refers to heights that were
/// actually queried.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Proposer query failed at height {height}: {source}")]
    Query {
        height: u64,
        #[source]
        source: ChainError,
    },

    #[error("Failed to persist production state: {0}")]
    Store(#[from] StoreError),
}

/// Inclusive height range in which the local validator should have proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl SearchRange {
    /// Range implied by the rotation offsets.
    ///
    /// `start = (latest_height - proposer_index) + local_index`, clamped at 0;
    /// `end = latest_height - 1`, absent at height 0. Returns `None` when the
    /// head height is too close to `u64::MAX` to be a real chain height.
    pub fn from_offsets(
        latest_height: u64,
        proposer_index: usize,
        local_index: usize,
    ) -> Option<Self> {
        let start = latest_height
            .checked_add(local_index as u64)?
            .saturating_sub(proposer_index as u64);
        Some(Self {
            start,
            end: latest_height.checked_sub(1),
        })
    }

    pub fn is_empty(&self) -> bool {
        match self.end {
            Some(end) => self.start > end,
            None => true,
        }
    }
}

/// Block-production auditor over an injected chain client and state store.
pub struct Auditor<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    store: &'a mut S,
}

impl<'a, C, S> Auditor<'a, C, S>
where
    C: ChainClient + ?Sized,
    S: StateStore + ?Sized,
{
    pub fn new(client: &'a C, store: &'a mut S) -> Self {
        Self { client, store }
    }

    /// Run one audit cycle starting from `state`.
    #[instrument(skip_all, fields(latest_height = input.latest_height))]
    pub fn audit(
        &mut self,
        input: &AuditInput<'_>,
        state: ProductionState,
    ) -> Result<AuditReport, AuditError> {
        match input.membership {
            Membership::Member => {}
            Membership::NotMember => {
                debug!("Not in quorum, skipping audit");
                return Ok(AuditReport::skipped(state, AuditStep::NotInQuorum));
            }
            Membership::Unknown => {
                debug!("Membership unknown, skipping audit");
                return Ok(AuditReport::skipped(state, AuditStep::MembershipUnknown));
            }
        }

        if input.latest_proposer == input.local {
            let state = ProductionState::produced_at(input.latest_height);
            self.store.set(
                LAST_PRODUCED_HEIGHT,
                StateValue::Integer(input.latest_height),
            )?;
            self.store.set(
                LAST_EXPECTED_HEIGHT,
                StateValue::Integer(input.latest_height),
            )?;
            info!(height = input.latest_height, "Local validator proposed the latest block");
            return Ok(AuditReport {
                state,
                status: Some(ProduceStatus::Ok),
                step: AuditStep::JustProduced,
            });
        }

        if !state.has_history() {
            debug!("No production observed yet");
            return Ok(AuditReport {
                state,
                status: Some(ProduceStatus::NoData),
                step: AuditStep::NoHistory,
            });
        }

        if input.quorum_changed {
            info!("Quorum changed, skipping search this cycle");
            return Ok(AuditReport::skipped(state, AuditStep::QuorumChanged));
        }

        // Only a proposer sorting after us says our turn in this rotation has
        // passed. The opposite case is left alone.
        if input.latest_proposer < input.local {
            debug!(
                proposer = %input.latest_proposer.short(),
                "Latest proposer sorts before local validator, nothing to conclude"
            );
            return Ok(AuditReport::skipped(state, AuditStep::ProposerBelowLocal));
        }

        let (Some(proposer_index), Some(local_index)) = (
            input.quorum.index_of(input.latest_proposer),
            input.quorum.index_of(input.local),
        ) else {
            warn!(
                proposer = %input.latest_proposer.short(),
                "Latest proposer not in quorum, skipping audit"
            );
            return Ok(AuditReport::skipped(state, AuditStep::ProposerNotInQuorum));
        };

        let Some(range) =
            SearchRange::from_offsets(input.latest_height, proposer_index, local_index)
        else {
            warn!(
                latest_height = input.latest_height,
                "Implausible head height, skipping audit"
            );
            return Ok(AuditReport::skipped(state, AuditStep::HeightOutOfRange));
        };

        if let Some(expected) = state.last_expected_height {
            if expected >= range.start {
                let status = state.derived_status();
                debug!(expected, search_start = range.start, %status, "Expected height already covered");
                return Ok(AuditReport {
                    state,
                    status: Some(status),
                    step: AuditStep::FastPath,
                });
            }
        }

        let Some(end) = range.end.filter(|end| range.start <= *end) else {
            warn!(search_start = range.start, "Empty search range");
            return Ok(AuditReport {
                state,
                status: Some(ProduceStatus::Error),
                step: AuditStep::EmptyRange,
            });
        };

        self.search(input.local, range.start, end, state)
    }

    /// Binary search `[start, end]` for a block proposed by `local`.
    fn search(
        &mut self,
        local: &ValidatorId,
        start: u64,
        end: u64,
        mut state: ProductionState,
    ) -> Result<AuditReport, AuditError> {
        let mut left = start;
        let mut right = end;
        let mut lookups = 0u32;

        while left <= right {
            let mid = left + (right - left) / 2;
            let proposer = self
                .client
                .proposer_at_height(mid)
                .map_err(|source| AuditError::Query {
                    height: mid,
                    source,
                })?;
            lookups += 1;

            state.last_expected_height = Some(mid);
            self.store
                .set(LAST_EXPECTED_HEIGHT, StateValue::Integer(mid))?;

            debug!(height = mid, proposer = %proposer.short(), "Looked up proposer");

            match proposer.cmp(local) {
                Ordering::Equal => {
                    state.last_produced_height = Some(mid);
                    self.store
                        .set(LAST_PRODUCED_HEIGHT, StateValue::Integer(mid))?;
                    info!(height = mid, lookups, "Found block proposed by local validator");
                    return Ok(AuditReport {
                        state,
                        status: Some(ProduceStatus::Ok),
                        step: AuditStep::Searched {
                            lookups,
                            found: true,
                        },
                    });
                }
                Ordering::Less => left = mid + 1,
                Ordering::Greater => match mid.checked_sub(1) {
                    Some(next) => right = next,
                    None => break,
                },
            }
        }

        warn!(start, end, lookups, "Local validator missed its expected block");
        Ok(AuditReport {
            state,
            status: Some(ProduceStatus::Error),
            step: AuditStep::Searched {
                lookups,
                found: false,
            },
        })
    }
}
