use std::collections::HashSet;

use chronx_core::Hash;

use crate::index::Index;

/// Recompute the pivot chain from genesis to the current tip.
///
/// At each step, among the current block's children, choose the one with
/// the highest subtree weight, tie-broken by lexicographically smallest
/// hash (spec §3 "Pivot Chain"). Because every block's level is exactly
/// `1 + max(level(parents))`, the pivot chain is contiguous by level:
/// `pivot_chain[i]` always has level `i` (genesis at level 0).
pub(crate) fn pivot_chain_from(index: &Index) -> Vec<Hash> {
    let mut chain = vec![Hash::GENESIS];
    let mut current = Hash::GENESIS;
    loop {
        let Some(children) = index.children.get(&current) else {
            break;
        };
        // `children` is a `BTreeSet<Hash>`, so iteration order is already
        // hash-ascending; fold explicitly rather than relying on
        // `Iterator::max_by`'s "last element wins on ties" rule, which
        // would pick the *largest* hash on a tie instead of the smallest.
        let mut best: Option<Hash> = None;
        let mut best_weight = 0u64;
        for &candidate in children {
            let w = index.weight.get(&candidate).copied().unwrap_or(0);
            let replace = match best {
                None => true,
                Some(_) => w > best_weight,
            };
            if replace {
                best = Some(candidate);
                best_weight = w;
            }
        }
        let Some(next) = best else {
            break;
        };
        chain.push(next);
        current = next;
    }
    chain
}

/// Given the pivot chain and the previous anchor's level, select the next
/// anchor: the deepest pivot-chain block whose level is `<= tip.level -
/// horizon` and `> prev_anchor_level`. `None` if no such block exists.
///
/// Because the pivot chain is contiguous by level (see `pivot_chain_from`),
/// "deepest eligible" collapses to a single index lookup: the only
/// candidate level is exactly `tip.level - horizon`.
pub fn anchor_for_period(
    pivot_chain: &[Hash],
    prev_anchor_level: u64,
    horizon: u64,
) -> Option<Hash> {
    if pivot_chain.is_empty() {
        return None;
    }
    let tip_level = pivot_chain.len() as u64 - 1;
    if tip_level < horizon {
        return None;
    }
    let candidate_level = tip_level - horizon;
    if candidate_level <= prev_anchor_level {
        return None;
    }
    pivot_chain.get(candidate_level as usize).copied()
}

/// `order_for_anchor(A_p) -> [H]` (spec §4.3).
///
/// BFS the causal past of `anchor` via parent edges, stopping at any block
/// already marked finalized (equivalent to stopping at `past(A_{p-1})`,
/// since by induction everything in `past(A_{p-1})` was finalized when
/// period `p-1` was ordered). The result is sorted by `(level asc,
/// is_pivot_predecessor desc, hash asc)`.
pub(crate) fn order_for_anchor(index: &Index, anchor: Hash) -> Vec<Hash> {
    let pivot_set: HashSet<Hash> = index.pivot_chain.iter().copied().collect();

    let mut visited = HashSet::new();
    let mut result = Vec::new();
    let mut stack = vec![anchor];
    while let Some(h) = stack.pop() {
        if h.is_genesis() || !visited.insert(h) {
            continue;
        }
        if index.is_finalized(&h) {
            continue;
        }
        result.push(h);
        if let Some(block) = index.blocks.get(&h) {
            for p in block.parents() {
                if !visited.contains(&p) {
                    stack.push(p);
                }
            }
        }
    }

    result.sort_by(|a, b| {
        let la = index.level_of(a).unwrap_or(0);
        let lb = index.level_of(b).unwrap_or(0);
        la.cmp(&lb)
            .then_with(|| pivot_set.contains(b).cmp(&pivot_set.contains(a)))
            .then_with(|| a.cmp(b))
    });

    result
}
