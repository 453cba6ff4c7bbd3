//! Translates inbound `P2pMessage` block gossip into C3/C4 calls.
//!
//! Kept as plain functions rather than methods on `P2pNetwork` so the
//! intake logic can be unit-tested without spinning up a libp2p swarm.

use chronx_consensus::PbftChain;
use chronx_core::{ChronxError, DagBlock, PbftBlock, PublicKey, Transaction, Vote};
use chronx_crypto::KeyRegistry;
use chronx_dag::DagStore;
use chronx_txpool::TxPool;

/// Register a gossiped sender's public key, if offered, then queue the
/// transaction for C2 verification.
pub fn handle_new_transaction(
    pool: &TxPool,
    registry: &KeyRegistry,
    tx: Transaction,
    sender_public_key: Option<PublicKey>,
) -> Result<(), ChronxError> {
    if let Some(pk) = sender_public_key {
        registry.register(tx.sender, pk);
    }
    pool.insert(tx, true)
}

/// Validate and persist a gossiped DAG block (spec §3 `add_block`).
pub fn handle_dag_block(
    dag: &DagStore,
    block: DagBlock,
    transactions: Vec<Transaction>,
) -> Result<(), ChronxError> {
    dag.add_block(block, transactions)
}

/// Validate and persist a gossiped PBFT block (spec §4 `extend`).
///
/// Finalizes the block's anchor first to obtain the block order C4's
/// `extend` needs to stamp `dag_block_period` for, mirroring the order the
/// teacher's own proposal loop follows.
pub fn handle_pbft_block(
    dag: &DagStore,
    pbft: &PbftChain,
    block: PbftBlock,
    cert_votes: Vec<Vote>,
) -> Result<(), ChronxError> {
    let anchor_order = dag.finalize_anchor(block.anchor)?;
    pbft.extend(block, cert_votes, anchor_order)
}
