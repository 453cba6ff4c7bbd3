use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::error;

use crate::executor::Executor;

/// How long `wait_for_period` blocks before re-checking the stop flag.
/// `PbftChain` has no notion of "stop" itself (spec §5: only C2's
/// `pop_unverified` and C6's own loop are named suspension points), so the
/// executor thread bounds its own wait and polls cooperative shutdown on
/// each wake, the same way `chronx-txpool`'s workers key off `pool.stop()`.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Spawn the single long-lived C6 executor thread (spec §5: "a single C6
/// executor thread"). It waits on `PbftChain`'s condition variable (fed by
/// `extend`), drains every period that becomes available, and loops.
/// Grounded in `examples/original_source/src/node/executor.hpp`'s
/// `exec_worker_`/`cv_executor`/`run()` shape.
pub fn spawn_executor(executor: Arc<Executor>) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let stopped = Arc::new(AtomicBool::new(false));
    let stopped_for_thread = stopped.clone();
    let handle = std::thread::Builder::new()
        .name("chronx-executor".to_string())
        .spawn(move || run_loop(executor, stopped_for_thread))
        .expect("spawning executor thread");
    (handle, stopped)
}

fn run_loop(executor: Arc<Executor>, stopped: Arc<AtomicBool>) {
    loop {
        match executor.drain() {
            Ok(_) => {}
            Err(e) => error!(error = %e, "executor: period execution failed"),
        }

        if stopped.load(Ordering::SeqCst) {
            return;
        }

        let next = match executor.next_period() {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "executor: failed to read next period, retrying");
                std::thread::sleep(STOP_POLL_INTERVAL);
                continue;
            }
        };
        executor.pbft().wait_for_period(next, STOP_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{ExecutionOutcome, NullSubscriber, StateTransition, TransactionReceipt};
    use chronx_consensus::{PbftChain, ReplayConfig, ReplayProtector};
    use chronx_core::{Address, ChronxError, DagBlock, Hash, PbftBlock, Signature, Timestamp, Transaction, VdfProof};
    use chronx_dag::{DagStore, DagStoreConfig};
    use chronx_store::{Store, StoreConfig};
    use chronx_txpool::{TxPool, TxPoolConfig};

    struct Identity;
    impl StateTransition for Identity {
        fn apply(
            &self,
            _period: u64,
            _timestamp: Timestamp,
            transactions: &[Transaction],
        ) -> Result<ExecutionOutcome, ChronxError> {
            Ok(ExecutionOutcome {
                state_root: Hash([7u8; 32]),
                receipts: transactions
                    .iter()
                    .map(|tx| TransactionReceipt {
                        tx_hash: tx.hash,
                        success: true,
                        gas_used: 21_000,
                        output: vec![],
                    })
                    .collect(),
            })
        }
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chronx_executor_worker_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn worker_thread_executes_period_once_extended() {
        let store = Arc::new(Store::open(scratch("worker"), StoreConfig::default()).unwrap());
        let dag = Arc::new(DagStore::open(store.clone(), DagStoreConfig::default()).unwrap());
        dag.seed_genesis(Address([0u8; 20]), 0).unwrap();
        let pbft = Arc::new(PbftChain::open(store.clone()).unwrap());
        let replay = Arc::new(ReplayProtector::open(store.clone(), ReplayConfig::default()).unwrap());
        let pool = Arc::new(TxPool::new(TxPoolConfig::default()));

        let executor = Arc::new(Executor::new(
            store,
            dag.clone(),
            pbft.clone(),
            replay,
            pool,
            Arc::new(Identity),
            Arc::new(NullSubscriber),
        ));
        let (handle, stopped) = spawn_executor(executor.clone());

        let mut b = DagBlock {
            hash: Hash::GENESIS,
            pivot: Hash::GENESIS,
            tips: vec![],
            level: 1,
            timestamp: 1,
            proposer: Address([1u8; 20]),
            vdf_proof: VdfProof(vec![]),
            transactions: vec![],
            signature: Signature(vec![]),
        };
        b.hash = b.compute_hash();
        dag.add_block(b.clone(), vec![]).unwrap();
        let order = dag.finalize_anchor(b.hash).unwrap();
        assert_eq!(order, vec![b.hash]);

        let mut p1 = PbftBlock {
            hash: Hash::GENESIS,
            parent: Hash::GENESIS,
            period: 1,
            anchor: b.hash,
            proposer: Address([2u8; 20]),
            timestamp: 2,
            signature: Signature(vec![]),
        };
        p1.hash = p1.compute_hash();
        pbft.extend(p1, vec![], order).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while executor.next_period().unwrap() == 1 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(executor.next_period().unwrap(), 2);

        stopped.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
