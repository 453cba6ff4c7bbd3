use serde::{Deserialize, Serialize};

use crate::types::{Address, Hash, Round, Signature, Step, Timestamp};

/// A finalized PBFT block. Pins exactly one DAG anchor for its period.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PbftBlock {
    pub hash: Hash,
    pub parent: Hash,
    pub period: u64,
    pub anchor: Hash,
    pub proposer: Address,
    pub timestamp: Timestamp,
    pub signature: Signature,
}

#[derive(Serialize)]
struct PbftBlockBody<'a> {
    parent: &'a Hash,
    period: u64,
    anchor: &'a Hash,
    proposer: &'a Address,
    timestamp: Timestamp,
}

impl PbftBlock {
    fn body(&self) -> PbftBlockBody<'_> {
        PbftBlockBody {
            parent: &self.parent,
            period: self.period,
            anchor: &self.anchor,
            proposer: &self.proposer,
            timestamp: self.timestamp,
        }
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("pbft block body serialization is infallible")
    }

    pub fn compute_hash(&self) -> Hash {
        Hash(*blake3::hash(&self.body_bytes()).as_bytes())
    }
}

/// A single PBFT vote over a candidate block. A *certified vote set* is a
/// collection of these satisfying the committee's threshold — evaluating
/// that threshold is out of scope here; the core only stores and retrieves
/// whatever set the caller presents as already-certified.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub block_hash: Hash,
    pub voter: Address,
    pub round: Round,
    pub step: Step,
    pub weight_proof: Vec<u8>,
    pub signature: Signature,
}

/// Lightweight descriptor of the PBFT chain tip, read without locking.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PbftHead {
    pub hash: Hash,
    pub period: u64,
}

impl PbftHead {
    pub const GENESIS: PbftHead = PbftHead {
        hash: Hash::GENESIS,
        period: 0,
    };
}
