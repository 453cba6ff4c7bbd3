//! A concrete `StateTransition` implementation.
//!
//! Spec §1 lists the EVM-equivalent state transition function as an external
//! collaborator whose internal semantics are out of scope; §4.6's only
//! requirement on it is that `apply` be deterministic and pure given its
//! inputs. This node needs an actual implementation to drive C6 end-to-end,
//! so it carries the smallest one that satisfies the interface: every
//! transaction is accepted unconditionally (no real ledger semantics), and
//! the state root folds each applied transaction's hash into the prior root
//! so it still advances meaningfully period over period. Grounded in
//! `chronx-executor`'s own test-local `Identity` fixture
//! (`crates/chronx-executor/src/executor.rs`), generalized from a constant
//! root to a running fold so a real state-transition function could be
//! swapped in later without changing anything else about the wiring.

use std::sync::Mutex;

use chronx_core::{ChronxError, Hash, Timestamp, Transaction};
use chronx_executor::{ExecutionOutcome, StateTransition, TransactionReceipt};

pub struct FoldingStateTransition {
    root: Mutex<Hash>,
}

impl FoldingStateTransition {
    pub fn new() -> Self {
        Self { root: Mutex::new(Hash::GENESIS) }
    }
}

impl Default for FoldingStateTransition {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTransition for FoldingStateTransition {
    fn apply(
        &self,
        _period: u64,
        _timestamp: Timestamp,
        transactions: &[Transaction],
    ) -> Result<ExecutionOutcome, ChronxError> {
        let mut root = self.root.lock().expect("state transition root lock poisoned");

        let mut hasher = blake3::Hasher::new();
        hasher.update(root.as_bytes());
        for tx in transactions {
            hasher.update(tx.hash.as_bytes());
        }
        *root = Hash::from_bytes(*hasher.finalize().as_bytes());

        let receipts = transactions
            .iter()
            .map(|tx| TransactionReceipt {
                tx_hash: tx.hash,
                success: true,
                gas_used: tx.gas,
                output: Vec::new(),
            })
            .collect();

        Ok(ExecutionOutcome { state_root: *root, receipts })
    }
}
