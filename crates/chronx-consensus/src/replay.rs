use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chronx_core::{AccountNonceWindow, Address, ChronxError, Transaction};
use chronx_store::{replay_window_key, Batch, Column, Store};
use tracing::debug;

/// Sentinel period used to key each sender's high-water mark, distinct from
/// any real period number (periods start at 1). Kept in the same column as
/// the rotating per-period nonce lists so a single `scan_prefix(sender)`
/// rebuilds both on `open()`.
const HIGH_WATER_PERIOD: u64 = u64::MAX;

#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    /// `replay_window_periods` (spec §6): how many trailing periods the
    /// bitmap covers before older entries are rotated out.
    pub window_periods: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            window_periods: chronx_core::DEFAULT_REPLAY_WINDOW_PERIODS,
        }
    }
}

/// C5: per-sender highest-finalized-nonce plus a sliding window of which
/// nonces were consumed in the last `window_periods` periods (spec §4.5).
///
/// Rebuildable from C1 like C3's index; `windows` is never the sole copy of
/// truth, `chronx-store`'s `replay_window` column is.
pub struct ReplayProtector {
    store: Arc<Store>,
    windows: RwLock<HashMap<Address, AccountNonceWindow>>,
    config: ReplayConfig,
}

impl ReplayProtector {
    pub fn open(store: Arc<Store>, config: ReplayConfig) -> Result<Self, ChronxError> {
        let mut windows: HashMap<Address, AccountNonceWindow> = HashMap::new();

        store.for_each(Column::ReplayWindow, |key, value| {
            if key.len() != 28 {
                return Ok(());
            }
            let mut addr_bytes = [0u8; 20];
            addr_bytes.copy_from_slice(&key[..20]);
            let sender = Address::from_bytes(addr_bytes);
            let mut period_bytes = [0u8; 8];
            period_bytes.copy_from_slice(&key[20..]);
            let period = u64::from_be_bytes(period_bytes);

            let entry = windows.entry(sender).or_default();
            if period == HIGH_WATER_PERIOD {
                let mut nonce_bytes = [0u8; 8];
                nonce_bytes.copy_from_slice(value);
                entry.highest_nonce = u64::from_be_bytes(nonce_bytes);
            } else {
                let nonces: Vec<u64> = bincode::deserialize(value)?;
                entry.used_by_period.insert(period, nonces);
            }
            Ok(())
        })?;

        Ok(Self {
            store,
            windows: RwLock::new(windows),
            config,
        })
    }

    /// `is_replay(t)` (spec §4.5): true iff `t.nonce <= highest(sender)` and
    /// the corresponding bit is still set in the tracked window. A nonce
    /// older than the window is, by construction, no longer tracked and is
    /// not reported as a replay — the bounded window is a deliberate
    /// trade-off the spec accepts in exchange for not growing forever.
    pub fn is_replay(&self, tx: &Transaction) -> bool {
        let windows = self.windows.read().expect("replay window lock poisoned");
        let Some(window) = windows.get(&tx.sender) else {
            return false;
        };
        if tx.nonce > window.highest_nonce {
            return false;
        }
        window
            .used_by_period
            .values()
            .any(|nonces| nonces.contains(&tx.nonce))
    }

    /// `commit_period(p, txs)` (spec §4.5): stage this period's consumed
    /// nonces into `batch` (to be committed atomically alongside the rest of
    /// C6's per-period write), then fold the same update into the in-memory
    /// windows. Call `apply_committed` only after `batch` has been
    /// successfully committed by the caller, mirroring C3's
    /// stage-then-apply pattern for keeping memory and disk from drifting
    /// apart on a mid-commit crash.
    pub fn stage_commit(
        &self,
        batch: &mut Batch<'_>,
        period: u64,
        applied: &[(Address, u64)],
    ) -> PendingWindowUpdate {
        let windows = self.windows.read().expect("replay window lock poisoned");

        let mut by_sender: BTreeMap<Address, Vec<u64>> = BTreeMap::new();
        for (sender, nonce) in applied {
            by_sender.entry(*sender).or_default().push(*nonce);
        }

        let mut new_highest = HashMap::new();
        let evict_before = period.saturating_sub(self.config.window_periods);

        for (sender, nonces) in &by_sender {
            let current_highest = windows.get(sender).map(|w| w.highest_nonce).unwrap_or(0);
            let highest = nonces.iter().copied().fold(current_highest, u64::max);
            new_highest.insert(*sender, highest);

            batch
                .put_encoded(Column::ReplayWindow, replay_window_key(sender, period), nonces)
                .expect("nonce list encoding is infallible");
            batch.put(
                Column::ReplayWindow,
                replay_window_key(sender, HIGH_WATER_PERIOD),
                highest.to_be_bytes(),
            );

            if evict_before > 0 {
                if let Some(window) = windows.get(sender) {
                    for &old_period in window.used_by_period.keys() {
                        if old_period < evict_before {
                            batch.delete(Column::ReplayWindow, replay_window_key(sender, old_period));
                        }
                    }
                }
            }
        }

        PendingWindowUpdate {
            period,
            evict_before,
            by_sender,
            new_highest,
        }
    }

    /// Fold a previously staged, now-committed update into the in-memory
    /// windows. Must be called after the batch `stage_commit` wrote into has
    /// been committed.
    pub fn apply_committed(&self, update: PendingWindowUpdate) {
        let mut windows = self.windows.write().expect("replay window lock poisoned");
        for (sender, nonces) in update.by_sender {
            let window = windows.entry(sender).or_default();
            window.used_by_period.insert(update.period, nonces);
            window.used_by_period.retain(|&p, _| p >= update.evict_before);
            if let Some(&highest) = update.new_highest.get(&sender) {
                window.highest_nonce = window.highest_nonce.max(highest);
            }
            debug!(sender = %sender, highest = window.highest_nonce, period = update.period, "replay window updated");
        }
    }

    /// Read-only snapshot of a sender's tracked window, for diagnostics/RPC.
    pub fn window_for(&self, sender: &Address) -> Option<AccountNonceWindow> {
        self.windows
            .read()
            .expect("replay window lock poisoned")
            .get(sender)
            .cloned()
    }
}

/// The result of `stage_commit`, to be handed to `apply_committed` once the
/// caller's batch is durably committed.
pub struct PendingWindowUpdate {
    period: u64,
    evict_before: u64,
    by_sender: BTreeMap<Address, Vec<u64>>,
    new_highest: HashMap<Address, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_store::StoreConfig;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chronx_replay_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn open_store(name: &str) -> Arc<Store> {
        Arc::new(Store::open(scratch(name), StoreConfig::default()).unwrap())
    }

    fn tx(sender: Address, nonce: u64) -> Transaction {
        Transaction {
            hash: chronx_core::Hash([0u8; 32]),
            nonce,
            sender,
            to: Address([9u8; 20]),
            value: 0,
            gas: 0,
            gas_price: 0,
            data: vec![],
            signature: chronx_core::Signature(vec![]),
        }
    }

    #[test]
    fn fresh_sender_is_never_a_replay() {
        let store = open_store("fresh");
        let protector = ReplayProtector::open(store, ReplayConfig::default()).unwrap();
        assert!(!protector.is_replay(&tx(Address([1u8; 20]), 0)));
    }

    #[test]
    fn committed_nonce_is_reported_as_replay() {
        let store = open_store("committed");
        let protector = ReplayProtector::open(store, ReplayConfig::default()).unwrap();
        let sender = Address([2u8; 20]);

        let mut batch = protector.store.batch();
        let update = protector.stage_commit(&mut batch, 1, &[(sender, 5)]);
        batch.commit().unwrap();
        protector.apply_committed(update);

        assert!(protector.is_replay(&tx(sender, 5)));
        assert!(protector.is_replay(&tx(sender, 3)));
        assert!(!protector.is_replay(&tx(sender, 6)));
    }

    #[test]
    fn rotation_drops_nonces_older_than_the_window() {
        let store = open_store("rotation");
        let protector = ReplayProtector::open(
            store,
            ReplayConfig {
                window_periods: 2,
            },
        )
        .unwrap();
        let sender = Address([3u8; 20]);

        for period in 1..=5u64 {
            let mut batch = protector.store.batch();
            let update = protector.stage_commit(&mut batch, period, &[(sender, period)]);
            batch.commit().unwrap();
            protector.apply_committed(update);
        }

        // Period 1's nonce (1) should have rotated out of the window by the
        // time period 5 commits (window_periods=2 keeps periods 3..=5).
        assert!(!protector.is_replay(&tx(sender, 1)));
        assert!(protector.is_replay(&tx(sender, 5)));
    }

    #[test]
    fn rebuild_recovers_windows() {
        let dir = scratch("rebuild");
        let sender = Address([4u8; 20]);
        {
            let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
            let protector = ReplayProtector::open(store, ReplayConfig::default()).unwrap();
            let mut batch = protector.store.batch();
            let update = protector.stage_commit(&mut batch, 1, &[(sender, 7)]);
            batch.commit().unwrap();
            protector.apply_committed(update);
        }
        let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
        let protector = ReplayProtector::open(store, ReplayConfig::default()).unwrap();
        assert!(protector.is_replay(&tx(sender, 7)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
