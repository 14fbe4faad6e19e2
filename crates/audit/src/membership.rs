//! Quorum membership and churn detection.

use crate::chain::ChainError;
use crate::store::{StateStore, StateValue, QUORUM_HASH};
use mnwatch_types::{Membership, QuorumFingerprint, QuorumSet, ValidatorId};
use tracing::{debug, info, warn};

/// Default minimum plausible quorum size.
///
/// Deployment-specific: a read returning fewer members than this is treated
/// as a failed fetch rather than a real quorum.
pub const DEFAULT_MIN_QUORUM_SIZE: usize = 67;

/// Membership evaluation configuration.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Smallest member count accepted as a real quorum.
    pub min_quorum_size: usize,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            min_quorum_size: DEFAULT_MIN_QUORUM_SIZE,
        }
    }
}

impl MembershipConfig {
    /// Set the minimum quorum size.
    pub fn with_min_quorum_size(mut self, min_quorum_size: usize) -> Self {
        self.min_quorum_size = min_quorum_size;
        self
    }
}

/// Result of a membership evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipReport {
    pub membership: Membership,
    /// True when the quorum differs from the one seen on the previous run
    /// (or there was no previous run). Always false when the quorum could not
    /// be read.
    pub quorum_changed: bool,
    /// Size of the fetched quorum, if the fetch succeeded.
    pub validators_in_quorum: Option<usize>,
    /// Fingerprint of the fetched quorum, if it was plausible.
    pub fingerprint: Option<QuorumFingerprint>,
}

impl MembershipReport {
    fn unknown(validators_in_quorum: Option<usize>) -> Self {
        Self {
            membership: Membership::Unknown,
            quorum_changed: false,
            validators_in_quorum,
            fingerprint: None,
        }
    }
}

/// Decides whether the local validator is in the active quorum and whether the
/// quorum changed since the last run.
#[derive(Debug, Clone, Default)]
pub struct MembershipEvaluator {
    config: MembershipConfig,
}

impl MembershipEvaluator {
    pub fn new(config: MembershipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    /// Evaluate membership for `local` against a quorum fetch result.
    ///
    /// On a plausible quorum the new fingerprint is persisted after the
    /// comparison, whatever the outcome. Store failures are logged and never
    /// abort the evaluation.
    pub fn evaluate<S: StateStore + ?Sized>(
        &self,
        fetched: Result<&QuorumSet, &ChainError>,
        local: &ValidatorId,
        store: &mut S,
    ) -> MembershipReport {
        let quorum = match fetched {
            Ok(quorum) => quorum,
            Err(e) => {
                warn!(error = %e, "Failed to fetch quorum, membership unknown");
                return MembershipReport::unknown(None);
            }
        };

        if quorum.len() < self.config.min_quorum_size {
            warn!(
                members = quorum.len(),
                min_quorum_size = self.config.min_quorum_size,
                "Quorum implausibly small, membership unknown"
            );
            return MembershipReport::unknown(Some(quorum.len()));
        }

        let membership = if quorum.contains(local) {
            Membership::Member
        } else {
            Membership::NotMember
        };

        let fingerprint = quorum.fingerprint();
        let previous = previous_fingerprint(store);
        let quorum_changed = previous != Some(fingerprint);

        if quorum_changed {
            info!(
                previous = ?previous,
                current = ?fingerprint,
                "Quorum changed since last run"
            );
        } else {
            debug!(fingerprint = ?fingerprint, "Quorum unchanged");
        }

        if let Err(e) = store.set(QUORUM_HASH, StateValue::Text(fingerprint.to_hex())) {
            warn!(error = %e, "Failed to persist quorum fingerprint");
        }

        MembershipReport {
            membership,
            quorum_changed,
            validators_in_quorum: Some(quorum.len()),
            fingerprint: Some(fingerprint),
        }
    }
}

fn previous_fingerprint<S: StateStore + ?Sized>(store: &S) -> Option<QuorumFingerprint> {
    match store.get(QUORUM_HASH) {
        Ok(Some(StateValue::Text(hex))) => {
            let parsed = QuorumFingerprint::from_hex(&hex);
            if parsed.is_none() {
                warn!(value = %hex, "Discarding corrupt quorum fingerprint");
            }
            parsed
        }
        Ok(Some(other)) => {
            warn!(value = ?other, "Discarding corrupt quorum fingerprint");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read quorum fingerprint");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use mnwatch_types::test_utils::{test_quorum, test_validator};

    fn evaluator(min: usize) -> MembershipEvaluator {
        MembershipEvaluator::new(MembershipConfig::default().with_min_quorum_size(min))
    }

    #[test]
    fn test_default_min_quorum_size() {
        assert_eq!(MembershipConfig::default().min_quorum_size, 67);
    }

    #[test]
    fn test_member_and_first_run_counts_as_changed() {
        let mut store = MemoryStateStore::new();
        let quorum = test_quorum(5);

        let report = evaluator(5).evaluate(Ok(&quorum), &test_validator(3), &mut store);

        assert_eq!(report.membership, Membership::Member);
        assert!(report.quorum_changed);
        assert_eq!(report.validators_in_quorum, Some(5));
        assert_eq!(
            store.get(QUORUM_HASH).unwrap(),
            Some(StateValue::Text(quorum.fingerprint().to_hex()))
        );
    }

    #[test]
    fn test_same_quorum_twice_is_unchanged() {
        let mut store = MemoryStateStore::new();
        let quorum = test_quorum(5);
        let eval = evaluator(5);

        eval.evaluate(Ok(&quorum), &test_validator(3), &mut store);
        let second = eval.evaluate(Ok(&quorum), &test_validator(3), &mut store);

        assert!(!second.quorum_changed);
    }

    #[test]
    fn test_reordered_quorum_is_a_change() {
        let mut store = MemoryStateStore::new();
        let quorum = test_quorum(5);
        let mut members = quorum.members().to_vec();
        members.swap(0, 4);
        let reordered = QuorumSet::new(members);
        let eval = evaluator(5);

        eval.evaluate(Ok(&quorum), &test_validator(3), &mut store);
        let report = eval.evaluate(Ok(&reordered), &test_validator(3), &mut store);

        assert!(report.quorum_changed);
        assert_eq!(
            store.get(QUORUM_HASH).unwrap(),
            Some(StateValue::Text(reordered.fingerprint().to_hex()))
        );
    }

    #[test]
    fn test_not_member() {
        let mut store = MemoryStateStore::new();
        let report = evaluator(5).evaluate(Ok(&test_quorum(5)), &test_validator(42), &mut store);

        assert_eq!(report.membership, Membership::NotMember);
        assert_eq!(report.membership.as_option(), Some(false));
    }

    #[test]
    fn test_small_quorum_is_unknown_not_false() {
        let mut store = MemoryStateStore::new();
        let report = evaluator(67).evaluate(Ok(&test_quorum(5)), &test_validator(3), &mut store);

        assert_eq!(report.membership, Membership::Unknown);
        assert_eq!(report.membership.as_option(), None);
        assert!(!report.quorum_changed);
        assert_eq!(report.validators_in_quorum, Some(5));
        // An implausible quorum must not overwrite the last good fingerprint.
        assert_eq!(store.get(QUORUM_HASH).unwrap(), None);
    }

    #[test]
    fn test_fetch_failure_is_unknown() {
        let mut store = MemoryStateStore::new();
        let error = ChainError::Timeout;
        let report = evaluator(5).evaluate(Err(&error), &test_validator(3), &mut store);

        assert_eq!(report, MembershipReport::unknown(None));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_corrupt_fingerprint_counts_as_changed() {
        let mut store = MemoryStateStore::new();
        store
            .set(QUORUM_HASH, StateValue::Text("zzzz".into()))
            .unwrap();

        let report = evaluator(5).evaluate(Ok(&test_quorum(5)), &test_validator(1), &mut store);
        assert!(report.quorum_changed);
    }
}
