use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use chronx_core::{ChronxError, DagBlock, Hash, Transaction, TransactionStatus};
use chronx_store::{level_index_key, level_prefix, status_keys, Column, Store};
use tracing::{info, warn};

use crate::index::{ancestors_of, Index};
use crate::ordering::{anchor_for_period, order_for_anchor, pivot_chain_from};

#[derive(Debug, Clone, Copy)]
pub struct DagStoreConfig {
    pub min_parents: usize,
    pub max_parents: usize,
}

impl Default for DagStoreConfig {
    fn default() -> Self {
        Self {
            min_parents: chronx_core::DAG_MIN_PARENTS,
            max_parents: chronx_core::DAG_MAX_PARENTS,
        }
    }
}

/// C3: the in-memory DAG index, backed by C1 for durability.
///
/// All mutation happens while holding the write lock over the in-memory
/// index so persistence and the index never drift apart (spec §5 "C3: a
/// single reader-writer lock over the in-memory index; persistence calls
/// happen while holding the write lock").
pub struct DagStore {
    store: Arc<Store>,
    inner: RwLock<Index>,
    config: DagStoreConfig,
}

impl DagStore {
    /// Rebuild the in-memory index from whatever `store` already has
    /// persisted (spec §3 "Ownership": C3's index is rebuildable from C1).
    /// On a fresh store this starts empty; callers are expected to seed the
    /// genesis block (via `chronx-genesis`) before calling `add_block`.
    pub fn open(store: Arc<Store>, config: DagStoreConfig) -> Result<Self, ChronxError> {
        let mut index = Index::empty();

        store.for_each(Column::DagBlocks, |_key, value| {
            let block: DagBlock = bincode::deserialize(value)?;
            index_insert_block(&mut index, &block);
            Ok(())
        })?;

        store.for_each(Column::DagBlocksState, |key, value| {
            if key.len() != 32 {
                return Ok(());
            }
            let mut arr = [0u8; 32];
            arr.copy_from_slice(key);
            let hash = Hash::from_bytes(arr);
            let state: chronx_core::DagBlockState = bincode::deserialize(value)?;
            index.finalized.insert(hash, state.finalized);
            Ok(())
        })?;

        // Subtree weight is not persisted; rebuild it the same way `add_block`
        // maintains it incrementally, just over every already-known block
        // instead of a single new one, so the rebuilt pivot chain matches the
        // pre-restart one on forked DAGs.
        let all_hashes: Vec<Hash> = index.blocks.keys().copied().collect();
        for h in all_hashes {
            *index.weight.entry(h).or_insert(0) += 1;
            for ancestor in ancestors_of(&index, h) {
                *index.weight.entry(ancestor).or_insert(0) += 1;
            }
        }
        if index.blocks.contains_key(&Hash::GENESIS) {
            index.weight.entry(Hash::GENESIS).or_insert(1);
        }

        index.pivot_chain = pivot_chain_from(&index);

        info!(
            blocks = index.blocks.len(),
            tip_level = index.pivot_chain.len().saturating_sub(1),
            "dag store: rebuilt in-memory index from store"
        );

        Ok(Self {
            store,
            inner: RwLock::new(index),
            config,
        })
    }

    /// Seed the genesis block, if absent. Genesis is the one block whose
    /// own hash equals the sentinel `Hash::GENESIS`, has no real parents,
    /// and is considered finalized from the start. Idempotent.
    pub fn seed_genesis(&self, proposer: chronx_core::Address, timestamp: i64) -> Result<(), ChronxError> {
        let mut index = self.inner.write().expect("dag index lock poisoned");
        if index.blocks.contains_key(&Hash::GENESIS) {
            return Ok(());
        }
        let genesis = DagBlock {
            hash: Hash::GENESIS,
            pivot: Hash::GENESIS,
            tips: vec![],
            level: 0,
            timestamp,
            proposer,
            vdf_proof: Default::default(),
            transactions: vec![],
            signature: chronx_core::Signature(vec![]),
        };

        let mut batch = self.store.batch();
        batch.put_encoded(Column::DagBlocks, genesis.hash.as_bytes(), &genesis)?;
        batch.put(Column::DagBlocksIndex, level_index_key(0, &genesis.hash), b"");
        batch.put_encoded(
            Column::DagBlocksState,
            genesis.hash.as_bytes(),
            &chronx_core::DagBlockState::FINALIZED,
        )?;
        batch.commit()?;

        index.blocks.insert(Hash::GENESIS, genesis);
        index.levels.entry(0).or_default().insert(Hash::GENESIS);
        index.finalized.insert(Hash::GENESIS, true);
        index.weight.insert(Hash::GENESIS, 1);
        index.pivot_chain = vec![Hash::GENESIS];
        Ok(())
    }

    /// `add_block(B)` (spec §4.3). Parents must already be known; this
    /// store does not buffer out-of-order blocks (spec's "or reject if the
    /// caller guarantees topological delivery" branch — the caller, i.e.
    /// the P2P intake layer, is responsible for only invoking this once a
    /// block's parents are resolved).
    ///
    /// `transactions` are the full bodies corresponding, in order, to
    /// `block.transactions`'s hashes — spec §4.1's `transactions` column is
    /// otherwise never populated, since a DAG block only carries hashes
    /// (§3 "Hashes of the transactions this block carries"). This is the
    /// point at which a transaction's durable status becomes `in_block`
    /// (`TransactionStatus::can_transition_to` already allows both
    /// `NotSeen -> InBlock` and `InPool -> InBlock`), persisted in the same
    /// batch as the block itself.
    pub fn add_block(&self, block: DagBlock, transactions: Vec<Transaction>) -> Result<(), ChronxError> {
        let mut index = self.inner.write().expect("dag index lock poisoned");

        if index.blocks.contains_key(&block.hash) {
            return Ok(());
        }

        block.validate_shape(self.config.min_parents, self.config.max_parents)?;

        if transactions.len() != block.transactions.len()
            || transactions
                .iter()
                .zip(block.transactions.iter())
                .any(|(tx, h)| tx.hash != *h)
        {
            return Err(ChronxError::InvariantViolation(format!(
                "dag block {} transaction bodies do not match its transaction hash list",
                block.hash
            )));
        }

        let parents = block.parents();
        let mut max_parent_level = 0u64;
        for p in &parents {
            match index.level_of(p) {
                Some(l) => max_parent_level = max_parent_level.max(l),
                None => {
                    return Err(ChronxError::InvariantViolation(format!(
                        "dag block {} references unknown parent {p}",
                        block.hash
                    )));
                }
            }
        }
        let expected_level = 1 + max_parent_level;
        if block.level != expected_level {
            return Err(ChronxError::InvariantViolation(format!(
                "dag block {} has level {} but expected {expected_level}",
                block.hash, block.level
            )));
        }

        let edge_count = parents.iter().filter(|p| !p.is_genesis()).count() as u64;

        let mut batch = self.store.batch();
        batch.put_encoded(Column::DagBlocks, block.hash.as_bytes(), &block)?;
        batch.put(
            Column::DagBlocksIndex,
            level_index_key(block.level, &block.hash),
            b"",
        );
        batch.put_encoded(
            Column::DagBlocksState,
            block.hash.as_bytes(),
            &chronx_core::DagBlockState::UNFINALIZED,
        )?;
        for tx in &transactions {
            batch.put_encoded(Column::Transactions, tx.hash.as_bytes(), tx)?;
            batch.put_encoded(Column::TrxStatus, tx.hash.as_bytes(), &TransactionStatus::InBlock)?;
        }

        let new_blk_count = self.store.dag_blk_count()? + 1;
        let new_edge_count = self.store.dag_edge_count()? + edge_count;
        self.store
            .status_put_u64_in(&mut batch, status_keys::DAG_BLK_COUNT, new_blk_count);
        self.store
            .status_put_u64_in(&mut batch, status_keys::DAG_EDGE_COUNT, new_edge_count);
        batch.commit()?;

        index_insert_block(&mut index, &block);
        index.weight.insert(block.hash, index.weight.get(&block.hash).copied().unwrap_or(0) + 1);
        for ancestor in ancestors_of(&index, block.hash) {
            *index.weight.entry(ancestor).or_insert(0) += 1;
        }
        index.pivot_chain = pivot_chain_from(&index);

        Ok(())
    }

    pub fn pivot_chain(&self) -> Vec<Hash> {
        self.inner.read().expect("dag index lock poisoned").pivot_chain.clone()
    }

    /// Anchor selection (spec §4.3). `prev_anchor` must be the previously
    /// pinned anchor (or `Hash::GENESIS` before any period has been
    /// finalized).
    pub fn select_anchor(&self, prev_anchor: Hash, horizon: u64) -> Option<Hash> {
        let index = self.inner.read().expect("dag index lock poisoned");
        let prev_level = index.level_of(&prev_anchor).unwrap_or(0);
        anchor_for_period(&index.pivot_chain, prev_level, horizon)
    }

    /// `order_for_anchor(A_p) -> [H]`, persisted in one atomic batch
    /// alongside the state-flag flips to `true` (spec §4.3). Returns the
    /// computed order. Calling this twice for the same anchor is harmless:
    /// the second call sees every block already finalized and returns an
    /// empty order.
    pub fn finalize_anchor(&self, anchor: Hash) -> Result<Vec<Hash>, ChronxError> {
        let mut index = self.inner.write().expect("dag index lock poisoned");
        if !index.blocks.contains_key(&anchor) {
            return Err(ChronxError::NotFound(format!("anchor block {anchor}")));
        }
        let order = order_for_anchor(&index, anchor);

        let mut batch = self.store.batch();
        batch.put_encoded(Column::DagFinalizedBlocks, anchor.as_bytes(), &order)?;
        for h in &order {
            batch.put_encoded(Column::DagBlocksState, h.as_bytes(), &chronx_core::DagBlockState::FINALIZED)?;
        }
        batch.commit()?;

        for h in &order {
            index.finalized.insert(*h, true);
        }
        if order.is_empty() {
            warn!(anchor = %anchor, "finalize_anchor: nothing new to order (already finalized)");
        }
        Ok(order)
    }

    pub fn block(&self, h: &Hash) -> Option<DagBlock> {
        self.inner.read().expect("dag index lock poisoned").blocks.get(h).cloned()
    }

    /// Up to `n` consecutive levels starting at `level`.
    pub fn blocks_at_level(&self, level: u64, n: u64) -> Vec<(u64, Vec<Hash>)> {
        let index = self.inner.read().expect("dag index lock poisoned");
        (level..level + n)
            .map(|l| {
                let hashes = index
                    .levels
                    .get(&l)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                (l, hashes)
            })
            .collect()
    }

    pub fn all_block_states(&self) -> std::collections::HashMap<Hash, bool> {
        self.inner.read().expect("dag index lock poisoned").finalized.clone()
    }

    /// Reads the period a DAG block was executed in, as written by C4's
    /// `extend` and re-affirmed by C6's per-period batch. `None` until the
    /// block is part of a finalized period.
    pub fn block_period(&self, h: &Hash) -> Result<Option<u64>, ChronxError> {
        match self.store.get(Column::DagBlockPeriod, h.as_bytes())? {
            Some(bytes) if bytes.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(Some(u64::from_be_bytes(arr)))
            }
            Some(_) => Err(ChronxError::Corrupt(format!("dag_block_period[{h}]"))),
            None => Ok(None),
        }
    }

    /// Reads a previously persisted anchor order without recomputing it —
    /// used by C6 so the executor's "deterministic function of persisted
    /// inputs" property (spec §4.6 step 2) holds even across a restart.
    pub fn finalized_order_for(&self, anchor: &Hash) -> Result<Option<Vec<Hash>>, ChronxError> {
        self.store.get_decoded(Column::DagFinalizedBlocks, anchor.as_bytes())
    }

    pub fn level_prefix_scan(&self, level: u64) -> Result<Vec<Hash>, ChronxError> {
        let mut out = Vec::new();
        self.store
            .scan_prefix(Column::DagBlocksIndex, level_prefix(level), |key, _| {
                if key.len() == 40 {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(&key[8..]);
                    out.push(Hash::from_bytes(arr));
                }
                Ok(())
            })?;
        Ok(out)
    }
}

fn index_insert_block(index: &mut Index, block: &DagBlock) {
    index.blocks.insert(block.hash, block.clone());
    index.levels.entry(block.level).or_insert_with(BTreeSet::new).insert(block.hash);
    for p in block.parents() {
        index.children.entry(p).or_default().insert(block.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::{Address, Signature, VdfProof};
    use chronx_store::StoreConfig;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chronx_dag_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn open_store(name: &str) -> Arc<Store> {
        Arc::new(Store::open(scratch(name), StoreConfig::default()).unwrap())
    }

    fn block(pivot: Hash, tips: Vec<Hash>, level: u64) -> DagBlock {
        let mut b = DagBlock {
            hash: Hash::GENESIS,
            pivot,
            tips,
            level,
            timestamp: 1,
            proposer: Address([1u8; 20]),
            vdf_proof: VdfProof(vec![]),
            transactions: vec![],
            signature: Signature(vec![]),
        };
        b.hash = b.compute_hash();
        b
    }

    #[test]
    fn scenario_2_pivot_and_anchor_and_order() {
        let store = open_store("scenario2");
        let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
        dag.seed_genesis(Address([0u8; 20]), 0).unwrap();

        let a = block(Hash::GENESIS, vec![], 1);
        dag.add_block(a.clone(), vec![]).unwrap();
        let b = block(a.hash, vec![], 2);
        dag.add_block(b.clone(), vec![]).unwrap();
        let c = block(Hash::GENESIS, vec![], 1);
        dag.add_block(c.clone(), vec![]).unwrap();

        let chain = dag.pivot_chain();
        assert_eq!(chain, vec![Hash::GENESIS, a.hash, b.hash]);

        let anchor = dag.select_anchor(Hash::GENESIS, 0).unwrap();
        assert_eq!(anchor, b.hash);

        let order = dag.finalize_anchor(anchor).unwrap();
        assert_eq!(order, vec![a.hash, b.hash]);
    }

    #[test]
    fn anchor_selection_respects_horizon() {
        let store = open_store("horizon");
        let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
        dag.seed_genesis(Address([0u8; 20]), 0).unwrap();
        let a = block(Hash::GENESIS, vec![], 1);
        dag.add_block(a.clone(), vec![]).unwrap();

        assert_eq!(dag.select_anchor(Hash::GENESIS, 5), None);
        assert_eq!(dag.select_anchor(Hash::GENESIS, 1), Some(a.hash));
    }

    #[test]
    fn add_block_with_unknown_parent_is_rejected() {
        let store = open_store("unknown_parent");
        let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
        dag.seed_genesis(Address([0u8; 20]), 0).unwrap();
        let dangling = block(Hash([9u8; 32]), vec![], 1);
        assert!(dag.add_block(dangling, vec![]).is_err());
    }

    #[test]
    fn add_block_with_wrong_level_is_rejected() {
        let store = open_store("wrong_level");
        let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
        dag.seed_genesis(Address([0u8; 20]), 0).unwrap();
        let wrong = block(Hash::GENESIS, vec![], 5);
        assert!(dag.add_block(wrong, vec![]).is_err());
    }

    #[test]
    fn rebuild_from_store_recovers_pivot_chain() {
        let dir = scratch("rebuild");
        let a_hash;
        let b_hash;
        {
            let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
            let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
            dag.seed_genesis(Address([0u8; 20]), 0).unwrap();
            let a = block(Hash::GENESIS, vec![], 1);
            a_hash = a.hash;
            dag.add_block(a.clone(), vec![]).unwrap();
            let b = block(a.hash, vec![], 2);
            b_hash = b.hash;
            dag.add_block(b, vec![]).unwrap();
        }
        let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
        let dag = DagStore::open(store, DagStoreConfig::default()).unwrap();
        assert_eq!(dag.pivot_chain(), vec![Hash::GENESIS, a_hash, b_hash]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
