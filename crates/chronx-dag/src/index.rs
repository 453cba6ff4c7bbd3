use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chronx_core::{DagBlock, Hash};

/// The rebuildable in-memory index over persisted DAG blocks (spec §4.3).
///
/// Everything here is reconstructable from `chronx-store`'s `dag_blocks` /
/// `dag_blocks_state` columns; `DagStore::open` rebuilds it on startup
/// rather than persisting it directly, per spec §3 "Ownership": "C3/C4 own
/// in-memory indices that are rebuildable from C1."
pub(crate) struct Index {
    pub(crate) blocks: HashMap<Hash, DagBlock>,
    /// hash -> hashes that reference it as pivot or tip.
    pub(crate) children: HashMap<Hash, BTreeSet<Hash>>,
    /// level -> hashes at that level, hash-ascending (append-only contract
    /// of spec §4.1's level index).
    pub(crate) levels: BTreeMap<u64, BTreeSet<Hash>>,
    /// Per-block finality flag.
    pub(crate) finalized: HashMap<Hash, bool>,
    /// Subtree weight: count of `self` plus every block reachable by
    /// following `children` edges (the DAG's "future set" of a block).
    pub(crate) weight: HashMap<Hash, u64>,
    /// Genesis..tip, cached. Recomputed after every insertion.
    pub(crate) pivot_chain: Vec<Hash>,
}

impl Index {
    pub(crate) fn empty() -> Self {
        Self {
            blocks: HashMap::new(),
            children: HashMap::new(),
            levels: BTreeMap::new(),
            finalized: HashMap::new(),
            weight: HashMap::new(),
            pivot_chain: Vec::new(),
        }
    }

    pub(crate) fn level_of(&self, h: &Hash) -> Option<u64> {
        if h.is_genesis() {
            Some(0)
        } else {
            self.blocks.get(h).map(|b| b.level)
        }
    }

    pub(crate) fn is_finalized(&self, h: &Hash) -> bool {
        h.is_genesis() || self.finalized.get(h).copied().unwrap_or(false)
    }
}

/// A read-only copy of index summary data for diagnostics/tests.
#[derive(Debug, Clone)]
pub struct DagIndexSnapshot {
    pub block_count: usize,
    pub pivot_chain: Vec<Hash>,
    pub tip_level: u64,
}

impl From<&Index> for DagIndexSnapshot {
    fn from(idx: &Index) -> Self {
        Self {
            block_count: idx.blocks.len(),
            pivot_chain: idx.pivot_chain.clone(),
            tip_level: idx.pivot_chain.len().saturating_sub(1) as u64,
        }
    }
}

/// BFS the ancestor set of `start` (via `parents()`), visiting each ancestor
/// hash exactly once. Used both to update subtree weights incrementally and
/// by `order_for_anchor`'s causal-past traversal.
pub(crate) fn ancestors_of(index: &Index, start: Hash) -> HashSet<Hash> {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(h) = stack.pop() {
        if h.is_genesis() {
            continue;
        }
        let Some(block) = index.blocks.get(&h) else {
            continue;
        };
        for p in block.parents() {
            if visited.insert(p) {
                stack.push(p);
            }
        }
    }
    visited
}
