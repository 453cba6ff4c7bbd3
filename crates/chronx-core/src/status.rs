use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monotone transaction lifecycle state. No backward transitions once
/// `Finalized` — see spec §3.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    NotSeen,
    InPool,
    InBlock,
    Finalized,
    Reverted,
}

impl TransactionStatus {
    /// Whether `self -> next` is an allowed transition under the monotone
    /// ordering `NotSeen -> InPool -> InBlock -> Finalized`, with `Reverted`
    /// reachable from `InBlock` as a terminal side-branch. `Finalized` itself
    /// is always terminal.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        if self == Finalized {
            return false;
        }
        matches!(
            (self, next),
            (NotSeen, InPool)
                | (InPool, InBlock)
                | (InBlock, Finalized)
                | (InBlock, Reverted)
                | (NotSeen, InBlock)
                | (InPool, Reverted)
        )
    }
}

/// For each sender, the highest known nonce plus a bitmap of which nonces
/// within the tracked window of recent periods have been consumed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountNonceWindow {
    pub highest_nonce: u64,
    /// period -> nonces consumed in that period.
    pub used_by_period: BTreeMap<u64, Vec<u64>>,
}

/// Process-wide counters persisted in C1 (`status` column).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounters {
    pub dag_blk_count: u64,
    pub dag_edge_count: u64,
    pub db_major_version: u32,
    pub db_minor_version: u32,
    pub num_executed_blocks: u64,
    pub num_executed_trx: u64,
}
