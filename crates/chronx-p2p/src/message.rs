use chronx_core::{DagBlock, Hash, PbftBlock, PublicKey, Transaction, Vote};
use serde::{Deserialize, Serialize};

/// Messages exchanged over the ChronX P2P gossip network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum P2pMessage {
    /// A peer is broadcasting a new signed transaction for the pool.
    /// `sender_public_key` lets a node that has never seen this sender
    /// register its key (see `chronx_crypto::KeyRegistry`); peers that
    /// already know the sender may omit it.
    NewTransaction {
        tx: Transaction,
        sender_public_key: Option<PublicKey>,
    },

    /// A peer is proposing a new DAG block, along with the transaction
    /// bodies it references (C3 `add_block` needs both).
    NewDagBlock {
        block: DagBlock,
        transactions: Vec<Transaction>,
    },

    /// Request a specific DAG block by hash (used during sync).
    RequestDagBlock { hash: Hash },

    /// A peer is announcing a new PBFT block extending the chain, with the
    /// committee's certifying votes.
    NewPbftBlock {
        block: PbftBlock,
        cert_votes: Vec<Vote>,
    },

    /// Respond with the current DAG tip hashes.
    SyncTips { tips: Vec<Hash> },

    /// Request to receive the current tip set from a peer.
    RequestTips,
}

impl P2pMessage {
    /// Serialize to bytes for GossipSub propagation.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("P2pMessage serialization is infallible")
    }

    /// Deserialize from GossipSub bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
