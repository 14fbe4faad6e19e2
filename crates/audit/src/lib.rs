//! Quorum membership and block-production auditing.
//!
//! The logic here is synchronous and free of I/O: the chain node and the
//! persistent state are reached through the [`ChainClient`] and [`StateStore`]
//! traits, which the agent implements over HTTP and a JSON file.
//!
//! # Components
//!
//! - [`MembershipEvaluator`]: is the local validator in the active quorum, and
//!   did the quorum change since the previous run?
//! - [`Auditor`]: did the local validator propose the block it was expected to
//!   propose in the current rotation?
//! - [`run_cycle`]: one invocation of both, as the agent runs it.
//!
//! # Example
//!
//! ```ignore
//! let evaluator = MembershipEvaluator::new(MembershipConfig::default());
//! let outcome = run_cycle(&client, &mut store, &local, &evaluator);
//! println!("{}", outcome.status);
//! ```

mod auditor;
mod chain;
mod cycle;
mod membership;
mod store;

pub use auditor::{AuditError, AuditInput, AuditReport, AuditStep, Auditor, SearchRange};
pub use chain::{ChainClient, ChainError};
pub use cycle::{run_cycle, CycleFailure, CycleOutcome};
pub use membership::{
    MembershipConfig, MembershipEvaluator, MembershipReport, DEFAULT_MIN_QUORUM_SIZE,
};
pub use store::{
    load_production_state, save_production_state, MemoryStateStore, StateStore, StateValue,
    StoreError, LAST_EXPECTED_HEIGHT, LAST_PRODUCED_HEIGHT, QUORUM_HASH,
};
