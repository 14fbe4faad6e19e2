//! One agent invocation: membership check followed by the production audit.

use crate::auditor::{AuditError, AuditInput, AuditReport, AuditStep, Auditor};
use crate::chain::{ChainClient, ChainError};
use crate::membership::{MembershipEvaluator, MembershipReport};
use crate::store::{load_production_state, StateStore};
use mnwatch_types::{Membership, ProduceStatus, ProductionState, ValidatorId};
use tracing::{info, instrument, warn};

/// Why a cycle could not reach a verdict.
#[derive(Debug, thiserror::Error)]
pub enum CycleFailure {
    #[error("Failed to read chain head: {0}")]
    Head(#[source] ChainError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Everything one cycle learned, ready for the report assembler.
#[derive(Debug)]
pub struct CycleOutcome {
    pub membership: MembershipReport,
    pub latest_height: Option<u64>,
    pub latest_proposer: Option<ValidatorId>,
    /// Production state after the cycle, as persisted.
    pub state: ProductionState,
    /// Audit branch taken, when the audit ran to completion.
    pub step: Option<AuditStep>,
    pub status: ProduceStatus,
    /// Set when the cycle was abandoned on a transient failure.
    pub failure: Option<CycleFailure>,
}

/// Run membership evaluation and the production audit once.
///
/// Never fails: chain and store errors are logged, recorded in
/// [`CycleOutcome::failure`] and reported as `NO_DATA`. The next scheduled
/// run retries from whatever was persisted.
#[instrument(skip_all, fields(local = %local.short()))]
pub fn run_cycle<C, S>(
    client: &C,
    store: &mut S,
    local: &ValidatorId,
    evaluator: &MembershipEvaluator,
) -> CycleOutcome
where
    C: ChainClient + ?Sized,
    S: StateStore + ?Sized,
{
    let state = load_production_state(&*store);

    let fetched = client.current_round_validators();
    let membership = evaluator.evaluate(fetched.as_ref(), local, store);

    let head = client
        .latest_height()
        .and_then(|height| client.current_proposer().map(|proposer| (height, proposer)));

    let (latest_height, latest_proposer) = match head {
        Ok((height, proposer)) => (height, proposer),
        Err(e) => {
            warn!(error = %e, "Failed to read chain head");
            let status = if membership.membership.is_member() {
                ProduceStatus::NoData
            } else {
                state.derived_status()
            };
            return CycleOutcome {
                membership,
                latest_height: None,
                latest_proposer: None,
                state,
                step: None,
                status,
                failure: Some(CycleFailure::Head(e)),
            };
        }
    };

    let quorum = match &fetched {
        Ok(quorum) if membership.membership != Membership::Unknown => Some(quorum),
        _ => None,
    };

    let result = match quorum {
        Some(quorum) => {
            let input = AuditInput {
                local,
                quorum,
                latest_height,
                latest_proposer: &latest_proposer,
                membership: membership.membership,
                quorum_changed: membership.quorum_changed,
            };
            Auditor::new(client, store).audit(&input, state)
        }
        None => Ok(AuditReport {
            state,
            status: None,
            step: AuditStep::MembershipUnknown,
        }),
    };

    match result {
        Ok(report) => {
            let status = report.effective_status();
            info!(
                membership = ?membership.membership,
                step = ?report.step,
                %status,
                "Audit cycle complete"
            );
            CycleOutcome {
                membership,
                latest_height: Some(latest_height),
                latest_proposer: Some(latest_proposer),
                state: report.state,
                step: Some(report.step),
                status,
                failure: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "Audit abandoned");
            CycleOutcome {
                membership,
                latest_height: Some(latest_height),
                latest_proposer: Some(latest_proposer),
                // Re-read: the search may have persisted queried heights before failing.
                state: load_production_state(&*store),
                step: None,
                status: ProduceStatus::NoData,
                failure: Some(e.into()),
            }
        }
    }
}
