//! Scripted in-memory chain shared by the audit integration tests.

#![allow(dead_code)]

use mnwatch_audit::{ChainClient, ChainError};
use mnwatch_types::{QuorumSet, ValidatorId};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Chain whose answers are fixed up front. Records every height queried.
pub struct ScriptedChain {
    pub quorum: Result<QuorumSet, ChainError>,
    pub head: Result<(u64, ValidatorId), ChainError>,
    pub blocks: BTreeMap<u64, ValidatorId>,
    /// Height at which `proposer_at_height` times out.
    pub fail_at: Option<u64>,
    queries: RefCell<Vec<u64>>,
}

impl ScriptedChain {
    pub fn new(quorum: QuorumSet, latest_height: u64, latest_proposer: ValidatorId) -> Self {
        Self {
            quorum: Ok(quorum),
            head: Ok((latest_height, latest_proposer)),
            blocks: BTreeMap::new(),
            fail_at: None,
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn with_block(mut self, height: u64, proposer: ValidatorId) -> Self {
        self.blocks.insert(height, proposer);
        self
    }

    /// Fill `[from, to]` with the quorum's rotation, `from` being proposed by
    /// the member at `first_index`.
    pub fn with_rotation(mut self, from: u64, to: u64, first_index: usize) -> Self {
        let quorum = self.quorum.clone().expect("scripted quorum");
        for (offset, height) in (from..=to).enumerate() {
            let index = (first_index + offset) % quorum.len();
            let proposer = quorum.validator_at_index(index).expect("index in range");
            self.blocks.insert(height, proposer.clone());
        }
        self
    }

    pub fn failing_at(mut self, height: u64) -> Self {
        self.fail_at = Some(height);
        self
    }

    /// Heights passed to `proposer_at_height`, in order.
    pub fn queries(&self) -> Vec<u64> {
        self.queries.borrow().clone()
    }
}

impl ChainClient for ScriptedChain {
    fn current_round_validators(&self) -> Result<QuorumSet, ChainError> {
        self.quorum.clone()
    }

    fn current_proposer(&self) -> Result<ValidatorId, ChainError> {
        self.head.clone().map(|(_, proposer)| proposer)
    }

    fn proposer_at_height(&self, height: u64) -> Result<ValidatorId, ChainError> {
        self.queries.borrow_mut().push(height);
        if self.fail_at == Some(height) {
            return Err(ChainError::Timeout);
        }
        self.blocks
            .get(&height)
            .cloned()
            .ok_or(ChainError::MissingBlock(height))
    }

    fn latest_height(&self) -> Result<u64, ChainError> {
        self.head.clone().map(|(height, _)| height)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
