use std::sync::Arc;
use std::thread::JoinHandle;

use chronx_crypto::recovery::SenderRecovery;
use tracing::debug;

use crate::pool::TxPool;

/// Spawn `n` verifier worker threads against `pool`, each recovering the
/// sender of every unverified transaction via `recovery` and promoting or
/// rejecting it accordingly. Mirrors `transaction_queue.hpp`'s worker
/// threads: plain OS threads, not tasks, per spec §5 ("Long-lived threads:
/// one or more C2 verifier workers").
///
/// Workers exit once `pool.stop()` has been called and the unverified queue
/// is drained — `pop_unverified` returning `None` is their sole exit
/// signal.
pub fn spawn_verifiers<R>(pool: Arc<TxPool>, recovery: Arc<R>, n: usize) -> Vec<JoinHandle<()>>
where
    R: SenderRecovery + 'static,
{
    (0..n.max(1))
        .map(|worker_id| {
            let pool = pool.clone();
            let recovery = recovery.clone();
            std::thread::Builder::new()
                .name(format!("chronx-txpool-verify-{worker_id}"))
                .spawn(move || verify_loop(pool, recovery))
                .expect("spawning txpool verifier thread")
        })
        .collect()
}

fn verify_loop<R: SenderRecovery>(pool: Arc<TxPool>, recovery: Arc<R>) {
    while let Some((hash, tx)) = pool.pop_unverified() {
        match recovery.recover_sender(&tx) {
            Ok(sender) if sender == tx.sender => {
                pool.promote(hash);
                debug!(hash = %hash, "transaction verified");
            }
            _ => {
                pool.reject(hash);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::{Address, ChronxError, Hash, Signature, Transaction};
    use chronx_crypto::keypair::KeyPair;
    use chronx_crypto::recovery::{DilithiumRecovery, PublicKeyLookup};
    use chronx_core::PublicKey;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapLookup(Mutex<HashMap<Address, PublicKey>>);
    impl PublicKeyLookup for MapLookup {
        fn public_key_for(&self, sender: Address) -> Option<PublicKey> {
            self.0.lock().unwrap().get(&sender).cloned()
        }
    }

    fn signed_tx(kp: &KeyPair) -> Transaction {
        let mut tx = Transaction {
            hash: Hash::GENESIS,
            nonce: 1,
            sender: kp.address,
            to: Address([2u8; 20]),
            value: 5,
            gas: 21_000,
            gas_price: 1,
            data: vec![],
            signature: Signature(vec![]),
        };
        tx.hash = tx.compute_hash();
        tx.signature = kp.sign(&tx.body_bytes());
        tx
    }

    #[test]
    fn worker_promotes_validly_signed_transaction() {
        let kp = KeyPair::generate();
        let mut registry = HashMap::new();
        registry.insert(kp.address, kp.public_key.clone());
        let recovery = Arc::new(DilithiumRecovery::new(MapLookup(Mutex::new(registry))));

        let pool = Arc::new(TxPool::new(crate::pool::TxPoolConfig::default()));
        let handles = spawn_verifiers(pool.clone(), recovery, 2);

        let tx = signed_tx(&kp);
        pool.insert(tx.clone(), true).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while pool.size().verified == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(pool.size().verified, 1);

        pool.stop();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn worker_rejects_unknown_sender() {
        let kp = KeyPair::generate();
        let recovery = Arc::new(DilithiumRecovery::new(MapLookup(Mutex::new(HashMap::new()))));
        let pool = Arc::new(TxPool::new(crate::pool::TxPoolConfig::default()));
        let handles = spawn_verifiers(pool.clone(), recovery, 1);

        let tx = signed_tx(&kp);
        pool.insert(tx.clone(), true).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while pool.size().unverified > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(pool.size().verified, 0);
        assert!(pool.get(&tx.hash).is_none());

        // Re-inserting the same hash must stay a no-op (rejected is terminal).
        assert!(matches!(pool.insert(tx, true), Ok(()) | Err(ChronxError::ShuttingDown)));

        pool.stop();
        for h in handles {
            h.join().unwrap();
        }
    }
}
