//! Stands in for the out-of-scope PBFT committee/voting collaborator (spec
//! §4.4: a *certified vote set* is "a collection... satisfying the
//! committee's threshold — evaluating that threshold is out of scope") on a
//! single-node deployment. Periodically proposes a DAG block from the
//! pool's current snapshot, then advances the PBFT chain over whatever
//! anchor the finalization horizon newly admits, self-certifying with an
//! empty vote set exactly as `chronx-dag`/`chronx-executor`'s own tests do
//! (`extend_with_anchor`, `vec![]`).
//!
//! A multi-node deployment would replace this with the real committee
//! protocol; nothing else in the wiring would need to change; `PbftChain`
//! and `DagStore` already take an arbitrary `cert_votes`/anchor from
//! whatever caller extends them.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chronx_consensus::PbftChain;
use chronx_core::{ChronxError, DagBlock, Hash, PbftBlock, Signature, VdfProof};
use chronx_crypto::KeyPair;
use chronx_dag::DagStore;
use chronx_p2p::P2pMessage;
use chronx_txpool::TxPool;
use tokio::sync::mpsc;
use tracing::{info, warn};

const PROPOSAL_INTERVAL: Duration = Duration::from_secs(2);

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Drive the proposal loop forever. Run in a dedicated tokio task.
pub async fn run(
    dag: Arc<DagStore>,
    pbft: Arc<PbftChain>,
    pool: Arc<TxPool>,
    keypair: Arc<KeyPair>,
    outbound_tx: mpsc::Sender<P2pMessage>,
    horizon: u64,
) {
    let mut ticker = tokio::time::interval(PROPOSAL_INTERVAL);
    loop {
        ticker.tick().await;

        if let Err(e) = propose_dag_block(&dag, &pool, &keypair, &outbound_tx).await {
            warn!(error = %e, "proposer: failed to propose dag block");
        }

        if let Err(e) = advance_pbft(&dag, &pbft, &keypair, &outbound_tx, horizon).await {
            warn!(error = %e, "proposer: failed to advance pbft chain");
        }
    }
}

async fn propose_dag_block(
    dag: &DagStore,
    pool: &TxPool,
    keypair: &KeyPair,
    outbound_tx: &mpsc::Sender<P2pMessage>,
) -> Result<(), ChronxError> {
    let snapshot = pool.snapshot(0, true);
    if snapshot.is_empty() {
        return Ok(());
    }
    let transactions: Vec<chronx_core::Transaction> = snapshot.into_values().collect();

    let pivot = *dag
        .pivot_chain()
        .last()
        .expect("pivot chain always contains at least genesis");
    let pivot_block = dag.block(&pivot).expect("pivot chain tip must be a known block");

    let mut block = DagBlock {
        hash: Hash::GENESIS,
        pivot,
        tips: vec![],
        level: pivot_block.level + 1,
        timestamp: now(),
        proposer: keypair.address,
        vdf_proof: VdfProof(vec![]),
        transactions: transactions.iter().map(|t| t.hash).collect(),
        signature: Signature(vec![]),
    };
    block.hash = block.compute_hash();
    block.signature = keypair.sign(&block.body_bytes());

    dag.add_block(block.clone(), transactions.clone())?;
    info!(hash = %block.hash, level = block.level, txs = transactions.len(), "proposer: dag block added");

    let _ = outbound_tx
        .send(P2pMessage::NewDagBlock { block, transactions })
        .await;
    Ok(())
}

async fn advance_pbft(
    dag: &DagStore,
    pbft: &PbftChain,
    keypair: &KeyPair,
    outbound_tx: &mpsc::Sender<P2pMessage>,
    horizon: u64,
) -> Result<(), ChronxError> {
    let head = pbft.head();
    let prev_anchor = if head.hash == Hash::GENESIS {
        Hash::GENESIS
    } else {
        pbft.pbft_block(&head.hash)?
            .ok_or_else(|| ChronxError::Corrupt("pbft head names a missing block".into()))?
            .anchor
    };

    let Some(anchor) = dag.select_anchor(prev_anchor, horizon) else {
        return Ok(());
    };

    let order = dag.finalize_anchor(anchor)?;

    let mut block = PbftBlock {
        hash: Hash::GENESIS,
        parent: head.hash,
        period: head.period + 1,
        anchor,
        proposer: keypair.address,
        timestamp: now(),
        signature: Signature(vec![]),
    };
    block.hash = block.compute_hash();
    block.signature = keypair.sign(&block.body_bytes());

    pbft.extend(block.clone(), vec![], order)?;
    info!(period = block.period, anchor = %anchor, "proposer: pbft chain extended");

    let _ = outbound_tx
        .send(P2pMessage::NewPbftBlock { block, cert_votes: vec![] })
        .await;
    Ok(())
}
