use std::sync::Arc;

use chronx_consensus::{PbftChain, ReplayProtector};
use chronx_core::{ChronxError, Hash, TransactionStatus};
use chronx_dag::DagStore;
use chronx_store::{status_keys, Column, Store};
use chronx_txpool::TxPool;
use tracing::info;

use crate::transition::{ExecutionSubscriber, FinalizedPeriod, StateTransition};

/// C6: consumes finalized PBFT blocks in period order and applies them to
/// state (spec §4.6). Owns no in-memory index of its own beyond what it
/// reads fresh from C1/C3/C4/C5 each period — its only durable progress
/// marker is `status.num_executed_blocks`.
pub struct Executor {
    store: Arc<Store>,
    dag: Arc<DagStore>,
    pbft: Arc<PbftChain>,
    replay: Arc<ReplayProtector>,
    pool: Arc<TxPool>,
    transition: Arc<dyn StateTransition>,
    subscriber: Arc<dyn ExecutionSubscriber>,
}

impl Executor {
    pub fn new(
        store: Arc<Store>,
        dag: Arc<DagStore>,
        pbft: Arc<PbftChain>,
        replay: Arc<ReplayProtector>,
        pool: Arc<TxPool>,
        transition: Arc<dyn StateTransition>,
        subscriber: Arc<dyn ExecutionSubscriber>,
    ) -> Self {
        Self {
            store,
            dag,
            pbft,
            replay,
            pool,
            transition,
            subscriber,
        }
    }

    /// The next period this executor has not yet applied (spec §4.6
    /// "Idempotence": restart resumes at `num_executed_blocks + 1`).
    pub fn next_period(&self) -> Result<u64, ChronxError> {
        Ok(self.store.num_executed_blocks()? + 1)
    }

    /// Execute one finalized period's pipeline if it is available. Returns
    /// `false` (no-op) if `period_pbft_block[next_period]` does not exist
    /// yet — the caller is expected to wait on `PbftChain::wait_for_period`
    /// before retrying.
    pub fn run_once(&self) -> Result<bool, ChronxError> {
        let period = self.next_period()?;

        let Some(pbft_hash) = self.pbft.period_block(period)? else {
            return Ok(false);
        };

        let p = self.pbft.pbft_block(&pbft_hash)?.ok_or_else(|| {
            ChronxError::Corrupt(format!("period_pbft_block[{period}] names missing pbft block"))
        })?;
        if p.period != period {
            return Err(ChronxError::InvariantViolation(format!(
                "period_pbft_block[{period}] names a pbft block for period {}",
                p.period
            )));
        }

        // Step 1+2: load the anchor's order and flatten its DAG blocks'
        // transactions, in order, into one sequence.
        let order = self.dag.finalized_order_for(&p.anchor)?.unwrap_or_default();
        let mut flattened = Vec::new();
        for block_hash in &order {
            let block = self
                .dag
                .block(block_hash)
                .ok_or_else(|| ChronxError::NotFound(format!("dag block {block_hash}")))?;
            for tx_hash in &block.transactions {
                let tx = self
                    .store
                    .get_decoded(Column::Transactions, tx_hash.as_bytes())?
                    .ok_or_else(|| ChronxError::NotFound(format!("transaction {tx_hash}")))?;
                flattened.push(tx);
            }
        }

        // Step 3: filter replays.
        let mut applied = Vec::with_capacity(flattened.len());
        let mut reverted = Vec::new();
        for tx in flattened {
            if self.replay.is_replay(&tx) {
                reverted.push(tx.hash);
            } else {
                applied.push(tx);
            }
        }

        // Step 4: invoke the external state-transition function.
        let outcome = self.transition.apply(period, p.timestamp, &applied)?;
        if outcome.receipts.len() != applied.len() {
            return Err(ChronxError::InvariantViolation(format!(
                "state transition returned {} receipts for {} applied transactions",
                outcome.receipts.len(),
                applied.len()
            )));
        }

        // Step 5: one atomic batch — receipts, status flips, dag_block_period
        // (also written by C4's `extend`; both writes agree on the same
        // value, so this is an idempotent re-affirmation, not a conflict),
        // executed counters, and the replay window's own staged update.
        let mut batch = self.store.batch();
        for receipt in &outcome.receipts {
            batch.put_encoded(Column::Receipts, receipt.tx_hash.as_bytes(), receipt)?;
            batch.put_encoded(Column::TrxStatus, receipt.tx_hash.as_bytes(), &TransactionStatus::Finalized)?;
        }
        for tx_hash in &reverted {
            batch.put_encoded(Column::TrxStatus, tx_hash.as_bytes(), &TransactionStatus::Reverted)?;
        }
        for b in &order {
            batch.put_encoded(Column::DagBlockPeriod, b.as_bytes(), &period)?;
        }

        let applied_nonces: Vec<(chronx_core::Address, u64)> =
            applied.iter().map(|tx| (tx.sender, tx.nonce)).collect();
        let window_update = self.replay.stage_commit(&mut batch, period, &applied_nonces);

        let new_exec_trx = self.store.num_executed_trx()? + outcome.receipts.len() as u64;
        self.store
            .status_put_u64_in(&mut batch, status_keys::NUM_EXECUTED_BLOCKS, period);
        self.store
            .status_put_u64_in(&mut batch, status_keys::NUM_EXECUTED_TRX, new_exec_trx);

        batch.commit()?;
        self.replay.apply_committed(window_update);
        self.store.maybe_snapshot(period)?;

        info!(
            period,
            anchor = %p.anchor,
            applied = outcome.receipts.len(),
            reverted = reverted.len(),
            "executor: period finalized"
        );

        // Step 6: notify subscribers.
        let executed: Vec<Hash> = outcome.receipts.iter().map(|r| r.tx_hash).collect();
        let finalized = FinalizedPeriod {
            period,
            pbft_hash,
            anchor: p.anchor,
            state_root: outcome.state_root,
            receipts: outcome.receipts,
            reverted: reverted.clone(),
        };
        self.subscriber.notify(&finalized);

        // Step 7: remove executed (and reverted — they're terminal too)
        // transactions from C2's pool.
        let mut to_remove = executed;
        to_remove.extend(reverted);
        self.pool.remove_block_transactions(&to_remove);

        Ok(true)
    }

    /// Drain every finalized-but-unapplied period currently available.
    pub fn drain(&self) -> Result<u64, ChronxError> {
        let mut count = 0u64;
        while self.run_once()? {
            count += 1;
        }
        Ok(count)
    }

    pub fn pbft(&self) -> &Arc<PbftChain> {
        &self.pbft
    }
}
