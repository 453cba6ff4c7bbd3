use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ChronxError;
use crate::types::{Address, Hash, Signature, Timestamp, VdfProof};

/// A block-DAG vertex. `pivot` is the block's single "main chain" parent;
/// `tips` are additional, non-pivot parent references. Both the pivot and
/// every tip must reference an already-stored block or the genesis sentinel
/// `Hash::GENESIS`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DagBlock {
    /// This block's own hash, over the canonical encoding excluding itself.
    pub hash: Hash,

    pub pivot: Hash,
    pub tips: Vec<Hash>,

    /// `1 + max(level(p) for p in parents(self))`. Genesis has level 0.
    pub level: u64,

    pub timestamp: Timestamp,
    pub proposer: Address,

    /// VDF proof accompanying the proposal. Verification of the proof itself
    /// is an external collaborator's responsibility; the core only stores
    /// and forwards it.
    pub vdf_proof: VdfProof,

    /// Hashes of the transactions this block carries, in block-local order.
    pub transactions: Vec<Hash>,

    pub signature: Signature,
}

#[derive(Serialize)]
struct DagBlockBody<'a> {
    pivot: &'a Hash,
    tips: &'a [Hash],
    level: u64,
    timestamp: Timestamp,
    proposer: &'a Address,
    vdf_proof: &'a VdfProof,
    transactions: &'a [Hash],
}

impl DagBlock {
    fn body(&self) -> DagBlockBody<'_> {
        DagBlockBody {
            pivot: &self.pivot,
            tips: &self.tips,
            level: self.level,
            timestamp: self.timestamp,
            proposer: &self.proposer,
            vdf_proof: &self.vdf_proof,
            transactions: &self.transactions,
        }
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("dag block body serialization is infallible")
    }

    pub fn compute_hash(&self) -> Hash {
        Hash(*blake3::hash(&self.body_bytes()).as_bytes())
    }

    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// `{pivot} ∪ tips`, per spec's `parents(B)` definition.
    pub fn parents(&self) -> HashSet<Hash> {
        let mut set: HashSet<Hash> = self.tips.iter().copied().collect();
        set.insert(self.pivot);
        set
    }

    /// Structural checks independent of any store lookup: no duplicate
    /// parents, block does not reference itself, parent-count bounds.
    pub fn validate_shape(
        &self,
        min_parents: usize,
        max_parents: usize,
    ) -> Result<(), ChronxError> {
        let parents = self.parents();
        let total_refs = 1 + self.tips.len();
        if parents.len() != total_refs {
            return Err(ChronxError::InvariantViolation(format!(
                "dag block {} has duplicate parent references",
                self.hash
            )));
        }
        if parents.contains(&self.hash) {
            return Err(ChronxError::InvariantViolation(format!(
                "dag block {} references itself as a parent",
                self.hash
            )));
        }
        if !self.pivot.is_genesis() && parents.len() < min_parents {
            return Err(ChronxError::TooFewParents {
                min: min_parents,
                got: parents.len(),
            });
        }
        if parents.len() > max_parents {
            return Err(ChronxError::TooManyParents {
                max: max_parents,
                got: parents.len(),
            });
        }
        Ok(())
    }
}

/// Per-block finality state. Transitions only `false -> true`, at most once.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DagBlockState {
    pub finalized: bool,
}

impl DagBlockState {
    pub const UNFINALIZED: DagBlockState = DagBlockState { finalized: false };
    pub const FINALIZED: DagBlockState = DagBlockState { finalized: true };
}
