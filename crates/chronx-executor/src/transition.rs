use chronx_core::{Hash, Timestamp, Transaction};
use serde::{Deserialize, Serialize};

/// Per-transaction outcome of a state transition, as returned by the
/// external state-transition function and persisted under `receipts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: Hash,
    pub success: bool,
    pub gas_used: u64,
    /// Opaque return data / log blob, interpreted only by the
    /// state-transition function's own callers (e.g. RPC).
    pub output: Vec<u8>,
}

/// What a period's execution produced. `receipts` is aligned index-for-
/// index with the transaction list `StateTransition::apply` was given.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub state_root: Hash,
    pub receipts: Vec<TransactionReceipt>,
}

/// The EVM-equivalent state-transition function (spec §1 "out of scope...
/// treated as an external collaborator"). `chronx-executor` depends only on
/// this trait, never on a concrete implementation — SPEC_FULL.md's
/// chronx-executor note: "modeled as a trait object... so the executor
/// crate has no dependency on any specific EVM-equivalent implementation."
///
/// Implementations own `D/state_db/` (spec §6) entirely; the executor never
/// reads or writes it directly.
pub trait StateTransition: Send + Sync {
    fn apply(
        &self,
        period: u64,
        timestamp: Timestamp,
        transactions: &[Transaction],
    ) -> Result<ExecutionOutcome, chronx_core::ChronxError>;
}

/// Descriptor handed to subscribers once a period is durably finalized
/// (spec §4.6 step 6, "notify the subscriber port... with the finalized
/// block descriptor and receipts").
#[derive(Debug, Clone)]
pub struct FinalizedPeriod {
    pub period: u64,
    pub pbft_hash: Hash,
    pub anchor: Hash,
    pub state_root: Hash,
    pub receipts: Vec<TransactionReceipt>,
    pub reverted: Vec<Hash>,
}

/// The opaque notification sink (spec §4.6: "C6's `WSServer` hook is an
/// opaque sink"). `chronx-rpc`'s websocket push implements this; tests use
/// an in-memory collector.
pub trait ExecutionSubscriber: Send + Sync {
    fn notify(&self, finalized: &FinalizedPeriod);
}

/// A subscriber that drops every notification. The default when no real
/// sink is wired up.
pub struct NullSubscriber;

impl ExecutionSubscriber for NullSubscriber {
    fn notify(&self, _finalized: &FinalizedPeriod) {}
}
