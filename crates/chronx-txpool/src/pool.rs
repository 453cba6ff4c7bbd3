use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use chronx_core::{ChronxError, Hash, Transaction};
use tracing::{debug, warn};

/// Recognized configuration for C2 (spec §6's `expected_max_trx_per_block`).
#[derive(Debug, Clone, Copy)]
pub struct TxPoolConfig {
    /// Default `snapshot(cap)` capacity hint when the caller passes `0`.
    pub expected_max_trx_per_block: usize,
}

impl Default for TxPoolConfig {
    fn default() -> Self {
        Self {
            expected_max_trx_per_block: chronx_core::DEFAULT_EXPECTED_MAX_TRX_PER_BLOCK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    pub verified: usize,
    pub unverified: usize,
}

struct Inner {
    /// Shared intake buffer: every transaction currently tracked by the
    /// pool, unverified or verified, keyed by hash.
    buffer: std::collections::HashMap<Hash, Transaction>,
    /// Hashes awaiting signature verification, in arrival order.
    unverified: VecDeque<Hash>,
    /// Hashes that passed verification (or were inserted pre-trusted),
    /// in insertion order. Priority is plain FIFO — spec §9 "Transaction
    /// priority" explicitly disclaims a fee-based ordering.
    verified: VecDeque<Hash>,
    verified_set: HashSet<Hash>,
    /// Terminal: hashes that failed verification. Never re-admitted.
    rejected: HashSet<Hash>,
}

impl Inner {
    fn new() -> Self {
        Self {
            buffer: std::collections::HashMap::new(),
            unverified: VecDeque::new(),
            verified: VecDeque::new(),
            verified_set: HashSet::new(),
            rejected: HashSet::new(),
        }
    }

    fn known(&self, hash: &Hash) -> bool {
        self.buffer.contains_key(hash) || self.rejected.contains(hash)
    }
}

/// C2: admission queue from untrusted intake to a verified pool.
///
/// One `Mutex<Inner>` guards both queues and the shared buffer; the
/// unverified condition variable is paired with that same mutex, mirroring
/// `transaction_queue.hpp`'s single `shared_mutex_for_unverified_qu_` +
/// `cond_for_unverified_qu_` pairing (std's `Condvar` only pairs with
/// `Mutex`, not `RwLock`, so the "reader-writer lock" of spec §5 is realized
/// here as one mutex — reads and writes to pool state are both brief enough
/// that a plain mutex costs nothing in practice; this divergence is noted in
/// DESIGN.md rather than forcing an `RwLock`+`Condvar` pairing std does not
/// support natively).
pub struct TxPool {
    inner: Mutex<Inner>,
    unverified_ready: Condvar,
    stopped: AtomicBool,
    config: TxPoolConfig,
}

impl TxPool {
    pub fn new(config: TxPoolConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            unverified_ready: Condvar::new(),
            stopped: AtomicBool::new(false),
            config,
        }
    }

    /// Admit `t`. If `hash(t)` is already known (verified, unverified, or
    /// rejected), this is a no-op. Otherwise the transaction is appended to
    /// the intake buffer; if `verify` is true it is queued for a worker,
    /// else it is placed directly into the verified pool (the "trusted"
    /// insertion path).
    pub fn insert(&self, t: Transaction, verify: bool) -> Result<(), ChronxError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ChronxError::ShuttingDown);
        }
        let hash = t.hash;
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        if inner.known(&hash) {
            debug!(hash = %hash, "insert: already known, no-op");
            return Ok(());
        }
        inner.buffer.insert(hash, t);
        if verify {
            inner.unverified.push_back(hash);
            drop(inner);
            self.unverified_ready.notify_one();
        } else {
            inner.verified.push_back(hash);
            inner.verified_set.insert(hash);
            drop(inner);
            self.unverified_ready.notify_all();
        }
        Ok(())
    }

    /// Block until an unverified transaction is available or the pool is
    /// stopped. Returns `None` only once `stop()` has been called and no
    /// unverified transaction remains — this is the cooperative
    /// cancellation point for verifier workers.
    pub fn pop_unverified(&self) -> Option<(Hash, Transaction)> {
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        loop {
            if let Some(hash) = inner.unverified.pop_front() {
                let tx = inner
                    .buffer
                    .get(&hash)
                    .cloned()
                    .expect("hash popped from unverified queue must be in buffer");
                return Some((hash, tx));
            }
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }
            inner = self
                .unverified_ready
                .wait(inner)
                .expect("txpool condvar wait poisoned");
        }
    }

    /// Move `hash` from unverified into the verified pool. No-op if `hash`
    /// is not currently tracked (e.g. it was already removed by a racing
    /// `remove_block_transactions`).
    pub fn promote(&self, hash: Hash) {
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        if !inner.buffer.contains_key(&hash) || inner.verified_set.contains(&hash) {
            return;
        }
        inner.verified.push_back(hash);
        inner.verified_set.insert(hash);
        drop(inner);
        self.unverified_ready.notify_all();
    }

    /// Signature verification failed for `hash`. Removed from the buffer,
    /// recorded as rejected (terminal — never re-admitted under this hash).
    pub fn reject(&self, hash: Hash) {
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        inner.buffer.remove(&hash);
        inner.verified_set.remove(&hash);
        inner.rejected.insert(hash);
        warn!(hash = %hash, "transaction rejected: signature verification failed");
    }

    /// Up to `cap` verified transactions (all, if `cap == 0`) in insertion
    /// order. If `remove` is true (the "move" variant) they are also removed
    /// from the verified view; if false (the "copy" variant) they remain.
    pub fn snapshot(&self, cap: usize, remove: bool) -> std::collections::HashMap<Hash, Transaction> {
        let cap = if cap == 0 {
            self.config.expected_max_trx_per_block
        } else {
            cap
        };
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        let mut out = std::collections::HashMap::new();
        if remove {
            for _ in 0..cap {
                let Some(hash) = inner.verified.pop_front() else {
                    break;
                };
                inner.verified_set.remove(&hash);
                if let Some(tx) = inner.buffer.get(&hash).cloned() {
                    out.insert(hash, tx);
                }
            }
        } else {
            for hash in inner.verified.iter().take(cap) {
                if let Some(tx) = inner.buffer.get(hash).cloned() {
                    out.insert(*hash, tx);
                }
            }
        }
        out
    }

    /// Atomic bulk removal, after a block is finalized. Removes from the
    /// buffer, the verified queue/set, and (defensively) the unverified
    /// queue — a transaction can be finalized via a block that referenced
    /// it while it was still awaiting verification locally.
    pub fn remove_block_transactions(&self, hashes: &[Hash]) {
        let mut inner = self.inner.lock().expect("txpool mutex poisoned");
        let to_remove: HashSet<Hash> = hashes.iter().copied().collect();
        inner.buffer.retain(|h, _| !to_remove.contains(h));
        inner.verified_set.retain(|h| !to_remove.contains(h));
        inner.verified.retain(|h| !to_remove.contains(h));
        inner.unverified.retain(|h| !to_remove.contains(h));
    }

    pub fn size(&self) -> PoolSizes {
        let inner = self.inner.lock().expect("txpool mutex poisoned");
        PoolSizes {
            verified: inner.verified.len(),
            unverified: inner.unverified.len(),
        }
    }

    /// Look up a tracked transaction by hash (verified or unverified).
    pub fn get(&self, hash: &Hash) -> Option<Transaction> {
        let inner = self.inner.lock().expect("txpool mutex poisoned");
        inner.buffer.get(hash).cloned()
    }

    /// `stop()`: set the stopped flag, wake every waiter, reject new
    /// operations going forward. Does not drop already-buffered state.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.unverified_ready.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
