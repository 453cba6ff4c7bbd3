use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chronx_core::{ChronxError, Hash, PbftBlock, PbftHead, Vote};
use chronx_store::{Column, Store};
use tracing::{info, warn};

/// C4: the append-only chain of PBFT blocks (spec §4.4).
///
/// `extend` is the sole mutator. A single `Mutex` both guards the chain
/// head and serializes concurrent `extend` calls; reads (`head()`) take the
/// same lock for the instant it takes to clone the head descriptor, which
/// is the same "brief mutex, not a literal reader-writer split" compromise
/// `chronx-txpool` makes for the same reason: std's `Condvar` only pairs
/// with `Mutex`, and the executor thread needs exactly that pairing to
/// sleep until `extend` produces the next period.
pub struct PbftChain {
    store: Arc<Store>,
    head: Mutex<PbftHead>,
    advanced: Condvar,
}

impl PbftChain {
    /// Rebuild `head` from whatever is persisted; `PbftHead::GENESIS` if
    /// nothing has been extended yet.
    pub fn open(store: Arc<Store>) -> Result<Self, ChronxError> {
        let head = store
            .get_decoded::<PbftHead>(Column::PbftHead, PBFT_HEAD_KEY)?
            .unwrap_or(PbftHead::GENESIS);
        info!(period = head.period, hash = %head.hash, "pbft chain: opened");
        Ok(Self {
            store,
            head: Mutex::new(head),
            advanced: Condvar::new(),
        })
    }

    pub fn head(&self) -> PbftHead {
        *self.head.lock().expect("pbft head lock poisoned")
    }

    pub fn pbft_block(&self, h: &Hash) -> Result<Option<PbftBlock>, ChronxError> {
        self.store.get_decoded(Column::PbftBlocks, h.as_bytes())
    }

    /// The PBFT block hash finalized for `period`, if any.
    pub fn period_block(&self, period: u64) -> Result<Option<Hash>, ChronxError> {
        self.store
            .get_decoded(Column::PeriodPbftBlock, period.to_be_bytes())
    }

    pub fn votes(&self, h: &Hash) -> Result<Vec<Vote>, ChronxError> {
        Ok(self
            .store
            .get_decoded(Column::Votes, h.as_bytes())?
            .unwrap_or_default())
    }

    /// `extend(P, cert_votes, anchor_order)` (spec §4.4): the sole mutator.
    /// Enforces `P.period == head.period + 1` and `P.parent == head.hash`;
    /// in one atomic batch writes `pbft_blocks[P.hash]`,
    /// `period_pbft_block[P.period]`, `votes[P.hash]`,
    /// `dag_block_period[b] = P.period` for each `b` in `anchor_order`, and
    /// `pbft_head`. Wakes any thread blocked in `wait_for_period`
    /// (the executor's condition variable, spec §4.6 "Loop").
    pub fn extend(
        &self,
        block: PbftBlock,
        cert_votes: Vec<Vote>,
        anchor_order: Vec<Hash>,
    ) -> Result<(), ChronxError> {
        let mut head = self.head.lock().expect("pbft head lock poisoned");

        if block.period != head.period + 1 {
            return Err(ChronxError::InvariantViolation(format!(
                "pbft block {} has period {} but chain head is at period {}",
                block.hash, block.period, head.period
            )));
        }
        if block.parent != head.hash {
            return Err(ChronxError::InvariantViolation(format!(
                "pbft block {} has parent {} but chain head is {}",
                block.hash, block.parent, head.hash
            )));
        }
        if self.pbft_block(&block.hash)?.is_some() {
            warn!(hash = %block.hash, "pbft extend: block already persisted, skipping");
            return Ok(());
        }

        let new_head = PbftHead {
            hash: block.hash,
            period: block.period,
        };

        let mut batch = self.store.batch();
        batch.put_encoded(Column::PbftBlocks, block.hash.as_bytes(), &block)?;
        batch.put_encoded(
            Column::PeriodPbftBlock,
            block.period.to_be_bytes(),
            &block.hash,
        )?;
        batch.put_encoded(Column::Votes, block.hash.as_bytes(), &cert_votes)?;
        for b in &anchor_order {
            batch.put_encoded(Column::DagBlockPeriod, b.as_bytes(), &block.period)?;
        }
        batch.put_encoded(Column::PbftHead, PBFT_HEAD_KEY, &new_head)?;
        batch.commit()?;

        *head = new_head;
        info!(period = new_head.period, hash = %new_head.hash, anchor_blocks = anchor_order.len(), "pbft chain: extended");
        drop(head);
        self.advanced.notify_all();
        Ok(())
    }

    /// Block the calling thread until `period_pbft_block[period]` exists,
    /// or `timeout` elapses. Used by the C6 executor loop (spec §4.6
    /// "waits on a condition variable fed by C4's `extend`").
    pub fn wait_for_period(&self, period: u64, timeout: Duration) {
        let guard = self.head.lock().expect("pbft head lock poisoned");
        let _ = self
            .advanced
            .wait_timeout_while(guard, timeout, |head| head.period < period);
    }
}

const PBFT_HEAD_KEY: &[u8] = b"head";

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::{Address, Signature};
    use chronx_store::StoreConfig;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chronx_pbft_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn open_store(name: &str) -> Arc<Store> {
        Arc::new(Store::open(scratch(name), StoreConfig::default()).unwrap())
    }

    fn pbft_block(parent: Hash, period: u64, anchor: Hash) -> PbftBlock {
        let mut b = PbftBlock {
            hash: Hash::GENESIS,
            parent,
            period,
            anchor,
            proposer: Address([2u8; 20]),
            timestamp: period as i64,
            signature: Signature(vec![]),
        };
        b.hash = b.compute_hash();
        b
    }

    #[test]
    fn extend_advances_head_and_persists() {
        let store = open_store("extend");
        let chain = PbftChain::open(store).unwrap();
        assert_eq!(chain.head(), PbftHead::GENESIS);

        let a_anchor = Hash([0xAA; 32]);
        let p1 = pbft_block(Hash::GENESIS, 1, a_anchor);
        chain
            .extend(p1.clone(), vec![], vec![Hash([1u8; 32]), Hash([2u8; 32])])
            .unwrap();

        assert_eq!(chain.head().period, 1);
        assert_eq!(chain.head().hash, p1.hash);
        assert_eq!(chain.period_block(1).unwrap(), Some(p1.hash));
        assert_eq!(chain.pbft_block(&p1.hash).unwrap().unwrap().anchor, a_anchor);
    }

    #[test]
    fn extend_rejects_wrong_period() {
        let store = open_store("wrong_period");
        let chain = PbftChain::open(store).unwrap();
        let p2 = pbft_block(Hash::GENESIS, 2, Hash([0xAA; 32]));
        assert!(chain.extend(p2, vec![], vec![]).is_err());
    }

    #[test]
    fn extend_rejects_wrong_parent() {
        let store = open_store("wrong_parent");
        let chain = PbftChain::open(store).unwrap();
        let p1 = pbft_block(Hash([0x11; 32]), 1, Hash([0xAA; 32]));
        assert!(chain.extend(p1, vec![], vec![]).is_err());
    }

    #[test]
    fn rebuild_recovers_head() {
        let dir = scratch("rebuild");
        let hash;
        {
            let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
            let chain = PbftChain::open(store).unwrap();
            let p1 = pbft_block(Hash::GENESIS, 1, Hash([0xAA; 32]));
            hash = p1.hash;
            chain.extend(p1, vec![], vec![]).unwrap();
        }
        let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
        let chain = PbftChain::open(store).unwrap();
        assert_eq!(chain.head(), PbftHead { hash, period: 1 });
        let _ = std::fs::remove_dir_all(&dir);
    }
}
