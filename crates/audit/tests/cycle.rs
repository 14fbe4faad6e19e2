//! Full agent cycles: membership evaluation feeding the audit.

mod common;

use common::{init_tracing, ScriptedChain};
use mnwatch_audit::{
    load_production_state, run_cycle, save_production_state, AuditStep, ChainError,
    CycleFailure, MembershipConfig, MembershipEvaluator, MemoryStateStore, StateStore,
    StateValue, QUORUM_HASH,
};
use mnwatch_types::test_utils::{test_quorum, test_validator};
use mnwatch_types::{Membership, ProduceStatus, ProductionState};

fn evaluator(min_quorum_size: usize) -> MembershipEvaluator {
    MembershipEvaluator::new(MembershipConfig::default().with_min_quorum_size(min_quorum_size))
}

/// Store that has already seen `quorum` and has some production history.
fn seeded_store(produced: u64, expected: u64) -> MemoryStateStore {
    let mut store = MemoryStateStore::new();
    store
        .set(
            QUORUM_HASH,
            StateValue::Text(test_quorum(5).fingerprint().to_hex()),
        )
        .unwrap();
    save_production_state(
        &mut store,
        &ProductionState {
            last_produced_height: Some(produced),
            last_expected_height: Some(expected),
        },
    )
    .unwrap();
    store
}

#[test]
fn test_cycle_finds_expected_block() {
    init_tracing();
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5)).with_rotation(96, 99, 0);
    let mut store = seeded_store(90, 90);

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(5));

    assert_eq!(outcome.membership.membership, Membership::Member);
    assert!(!outcome.membership.quorum_changed);
    assert_eq!(outcome.status, ProduceStatus::Ok);
    assert_eq!(outcome.latest_height, Some(100));
    assert_eq!(outcome.latest_proposer, Some(test_validator(5)));
    assert_eq!(outcome.state.last_produced_height, Some(98));
    assert!(outcome.failure.is_none());
}

#[test]
fn test_cycle_is_idempotent_without_new_blocks() {
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5))
        .with_block(98, test_validator(4))
        .with_block(99, test_validator(5));
    let mut store = seeded_store(90, 90);
    let local = test_validator(3);
    let eval = evaluator(5);

    let first = run_cycle(&chain, &mut store, &local, &eval);
    let lookups = chain.queries().len();
    let second = run_cycle(&chain, &mut store, &local, &eval);

    assert_eq!(first.status, ProduceStatus::Error);
    assert_eq!(second.status, ProduceStatus::Error);
    assert_eq!(first.state, second.state);
    assert_eq!(second.step, Some(AuditStep::FastPath));
    assert_eq!(chain.queries().len(), lookups);
}

#[test]
fn test_first_run_counts_as_quorum_change() {
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5)).with_rotation(96, 99, 0);
    let mut store = MemoryStateStore::new();
    save_production_state(&mut store, &ProductionState::produced_at(90)).unwrap();

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(5));

    assert!(outcome.membership.quorum_changed);
    assert_eq!(outcome.step, Some(AuditStep::QuorumChanged));
    // Skipped cycles report what the stored heights say.
    assert_eq!(outcome.status, ProduceStatus::Ok);
    assert!(chain.queries().is_empty());
    assert!(store.get(QUORUM_HASH).unwrap().is_some());
}

#[test]
fn test_small_quorum_is_unknown_and_not_audited() {
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5)).with_rotation(96, 99, 0);
    let mut store = seeded_store(90, 90);

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(67));

    assert_eq!(outcome.membership.membership, Membership::Unknown);
    assert_eq!(outcome.membership.validators_in_quorum, Some(5));
    assert_eq!(outcome.step, Some(AuditStep::MembershipUnknown));
    assert!(chain.queries().is_empty());
}

#[test]
fn test_quorum_fetch_failure_is_unknown() {
    let mut chain =
        ScriptedChain::new(test_quorum(5), 100, test_validator(5)).with_rotation(96, 99, 0);
    chain.quorum = Err(ChainError::Transport("connection refused".into()));
    let mut store = seeded_store(90, 90);

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(5));

    assert_eq!(outcome.membership.membership.as_option(), None);
    assert_eq!(outcome.membership.validators_in_quorum, None);
    assert!(chain.queries().is_empty());
}

#[test]
fn test_not_member_reports_stored_status() {
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5));
    let mut store = seeded_store(90, 95);

    let outcome = run_cycle(&chain, &mut store, &test_validator(42), &evaluator(5));

    assert_eq!(outcome.membership.membership.as_option(), Some(false));
    assert_eq!(outcome.step, Some(AuditStep::NotInQuorum));
    assert_eq!(outcome.status, ProduceStatus::Error);
}

#[test]
fn test_head_failure_reports_no_data() {
    let mut chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5));
    chain.head = Err(ChainError::Timeout);
    let mut store = seeded_store(90, 90);

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(5));

    assert_eq!(outcome.status, ProduceStatus::NoData);
    assert_eq!(outcome.latest_height, None);
    assert!(matches!(
        outcome.failure,
        Some(CycleFailure::Head(ChainError::Timeout))
    ));
    assert_eq!(load_production_state(&store).last_produced_height, Some(90));
}

#[test]
fn test_failed_search_reports_no_data_with_lookups_persisted() {
    let chain = ScriptedChain::new(test_quorum(5), 100, test_validator(5))
        .with_block(98, test_validator(4))
        .failing_at(98);
    let mut store = seeded_store(90, 90);

    let outcome = run_cycle(&chain, &mut store, &test_validator(3), &evaluator(5));

    assert_eq!(outcome.status, ProduceStatus::NoData);
    assert!(matches!(outcome.failure, Some(CycleFailure::Audit(_))));
    assert_eq!(outcome.step, None);
    // Nothing was queried successfully, so the stored heights are unchanged.
    assert_eq!(
        outcome.state,
        ProductionState {
            last_produced_height: Some(90),
            last_expected_height: Some(90),
        }
    );
}
