use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chronx_core::{ChronxError, DB_MAJOR_VERSION, DB_MINOR_VERSION};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::batch::Batch;
use crate::columns::{status_keys, Column};

/// Recognized configuration for C1 (spec §6).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `db_snapshot_each_n_pbft_block`. 0 disables snapshotting.
    pub snapshot_stride: u64,
    /// `db_max_snapshots`. FIFO eviction once exceeded.
    pub max_snapshots: usize,
    /// `db_revert_to_period`. One-shot: consumed at `open()`.
    pub revert_to_period: Option<u64>,
    /// `rebuild`.
    pub rebuild: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_stride: 0,
            max_snapshots: 5,
            revert_to_period: None,
            rebuild: false,
        }
    }
}

/// The durable, column-partitioned key-value store (C1).
///
/// Persisted layout under a node directory `D` (spec §6):
/// - `D/db/`: the live state tree.
/// - `D/state_db/`: opaque blob owned by the external state-transition
///   function; `Store` only copies it during snapshot/revert/rebuild, never
///   reads its contents.
/// - `D/db<period>/`, `D/state_db<period>/`: snapshots.
/// - `D/db-rebuild-backup-<ts>/`, `D/state_db-rebuild-backup-<ts>/`: rebuild
///   backups.
pub struct Store {
    root: PathBuf,
    db: sled::Db,
    trees: HashMap<Column, sled::Tree>,
    pub(crate) commit_lock: Mutex<()>,
    config: StoreConfig,
    snapshots: Mutex<BTreeSet<u64>>,
    minor_version_drift: bool,
}

impl Store {
    pub fn open<P: AsRef<Path>>(root: P, config: StoreConfig) -> Result<Self, ChronxError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| ChronxError::Storage(e.to_string()))?;

        if config.rebuild {
            rebuild_backup(&root)?;
        }

        if let Some(period) = config.revert_to_period {
            revert_directories_to_period(&root, period)?;
        }

        let db_dir = db_dir(&root);
        let db = sled::open(&db_dir)?;

        let mut trees = HashMap::new();
        for col in Column::ALL {
            let tree = db.open_tree(col.name())?;
            trees.insert(*col, tree);
        }

        let snapshots = Mutex::new(discover_snapshots(&root));

        let mut store = Self {
            root,
            db,
            trees,
            commit_lock: Mutex::new(()),
            config,
            snapshots,
            minor_version_drift: false,
        };

        store.minor_version_drift = store.check_version_gate()?;

        Ok(store)
    }

    fn tree(&self, col: Column) -> &sled::Tree {
        self.trees
            .get(&col)
            .unwrap_or_else(|| panic!("column {:?} was not opened", col))
    }

    // ── Generic contract (spec §4.1) ────────────────────────────────────────

    pub fn get(&self, col: Column, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>, ChronxError> {
        Ok(self.tree(col).get(key)?.map(|v| v.to_vec()))
    }

    pub fn get_decoded<T: DeserializeOwned>(
        &self,
        col: Column,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<T>, ChronxError> {
        match self.get(col, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Batched reads. sled has no atomic cross-key MultiGet, so this is a
    /// sequential `get` per key (see SPEC_FULL.md's "Supplemented features").
    pub fn multi_get(
        &self,
        col: Column,
        keys: &[impl AsRef<[u8]>],
    ) -> Result<Vec<Option<Vec<u8>>>, ChronxError> {
        keys.iter().map(|k| self.get(col, k)).collect()
    }

    pub fn for_each<F>(&self, col: Column, mut visitor: F) -> Result<(), ChronxError>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), ChronxError>,
    {
        for item in self.tree(col).iter() {
            let (k, v) = item?;
            visitor(&k, &v)?;
        }
        Ok(())
    }

    pub fn scan_prefix<F>(
        &self,
        col: Column,
        prefix: impl AsRef<[u8]>,
        mut visitor: F,
    ) -> Result<(), ChronxError>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), ChronxError>,
    {
        for item in self.tree(col).scan_prefix(prefix) {
            let (k, v) = item?;
            visitor(&k, &v)?;
        }
        Ok(())
    }

    /// A single, unbatched write. Atomic with respect to that one key only.
    pub fn insert(
        &self,
        col: Column,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<(), ChronxError> {
        let _guard = self.commit_lock.lock().expect("commit lock poisoned");
        self.tree(col).insert(key, value.as_ref())?;
        Ok(())
    }

    pub fn insert_encoded<T: serde::Serialize>(
        &self,
        col: Column,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<(), ChronxError> {
        let bytes = bincode::serialize(value)?;
        self.insert(col, key, bytes)
    }

    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    pub fn flush(&self) -> Result<(), ChronxError> {
        self.db.flush()?;
        Ok(())
    }

    // ── Status counters ──────────────────────────────────────────────────────

    pub fn status_get_u64(&self, key: &str) -> Result<Option<u64>, ChronxError> {
        match self.get(Column::Status, key.as_bytes())? {
            Some(bytes) if bytes.len() == 8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(Some(u64::from_be_bytes(arr)))
            }
            Some(other) => Err(ChronxError::Corrupt(format!(
                "status key {key} has unexpected length {}",
                other.len()
            ))),
            None => Ok(None),
        }
    }

    pub fn status_put_u64_in(&self, batch: &mut Batch<'_>, key: &str, value: u64) {
        batch.put(Column::Status, key.as_bytes(), value.to_be_bytes());
    }

    pub fn num_executed_blocks(&self) -> Result<u64, ChronxError> {
        Ok(self
            .status_get_u64(status_keys::NUM_EXECUTED_BLOCKS)?
            .unwrap_or(0))
    }

    pub fn num_executed_trx(&self) -> Result<u64, ChronxError> {
        Ok(self
            .status_get_u64(status_keys::NUM_EXECUTED_TRX)?
            .unwrap_or(0))
    }

    pub fn dag_blk_count(&self) -> Result<u64, ChronxError> {
        Ok(self.status_get_u64(status_keys::DAG_BLK_COUNT)?.unwrap_or(0))
    }

    pub fn dag_edge_count(&self) -> Result<u64, ChronxError> {
        Ok(self
            .status_get_u64(status_keys::DAG_EDGE_COUNT)?
            .unwrap_or(0))
    }

    pub fn minor_version_drift(&self) -> bool {
        self.minor_version_drift
    }

    /// Returns whether minor-version drift was observed. Fatal major
    /// mismatches are returned as `Err`, never silently absorbed.
    fn check_version_gate(&self) -> Result<bool, ChronxError> {
        let on_disk_major = self.status_get_u64(status_keys::DB_MAJOR_VERSION)?;
        let on_disk_minor = self.status_get_u64(status_keys::DB_MINOR_VERSION)?;

        match on_disk_major {
            None => {
                // Fresh store: stamp the current binary's version.
                let mut batch = self.batch();
                self.status_put_u64_in(&mut batch, status_keys::DB_MAJOR_VERSION, DB_MAJOR_VERSION as u64);
                self.status_put_u64_in(&mut batch, status_keys::DB_MINOR_VERSION, DB_MINOR_VERSION as u64);
                batch.commit()?;
                Ok(false)
            }
            Some(major) if major as u32 != DB_MAJOR_VERSION => Err(ChronxError::VersionMismatch {
                on_disk_major: major as u32,
                on_disk_minor: on_disk_minor.unwrap_or(0) as u32,
                binary_major: DB_MAJOR_VERSION,
                binary_minor: DB_MINOR_VERSION,
            }),
            Some(_) => {
                let minor = on_disk_minor.unwrap_or(0) as u32;
                if minor != DB_MINOR_VERSION {
                    warn!(on_disk_minor = minor, binary_minor = DB_MINOR_VERSION, "minor version drift");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    // ── Snapshots (spec §4.1 "Snapshots") ───────────────────────────────────

    /// If `period % snapshot_stride == 0` (stride 0 disables snapshotting),
    /// copy the current state tree and state-db blob to a sibling directory
    /// keyed by `period`, then evict the oldest snapshot past
    /// `max_snapshots`. Returns whether a snapshot was taken.
    pub fn maybe_snapshot(&self, period: u64) -> Result<bool, ChronxError> {
        if self.config.snapshot_stride == 0 {
            return Ok(false);
        }
        if period % self.config.snapshot_stride != 0 {
            return Ok(false);
        }

        self.flush()?;

        let snap_db = snapshot_db_dir(&self.root, period);
        let snap_state = snapshot_state_dir(&self.root, period);
        remove_dir_if_exists(&snap_db)?;
        remove_dir_if_exists(&snap_state)?;
        copy_dir_recursive(&db_dir(&self.root), &snap_db)?;
        let live_state = state_db_dir(&self.root);
        if live_state.exists() {
            copy_dir_recursive(&live_state, &snap_state)?;
        }

        info!(period, "snapshot created");

        let mut snapshots = self.snapshots.lock().expect("snapshot lock poisoned");
        snapshots.insert(period);
        while snapshots.len() > self.config.max_snapshots {
            let oldest = *snapshots
                .iter()
                .next()
                .expect("snapshots non-empty by loop condition");
            snapshots.remove(&oldest);
            remove_dir_if_exists(&snapshot_db_dir(&self.root, oldest))?;
            remove_dir_if_exists(&snapshot_state_dir(&self.root, oldest))?;
            debug!(period = oldest, "snapshot evicted");
        }

        Ok(true)
    }

    pub fn snapshot_periods(&self) -> Vec<u64> {
        self.snapshots
            .lock()
            .expect("snapshot lock poisoned")
            .iter()
            .copied()
            .collect()
    }
}

fn db_dir(root: &Path) -> PathBuf {
    root.join("db")
}

fn state_db_dir(root: &Path) -> PathBuf {
    root.join("state_db")
}

fn snapshot_db_dir(root: &Path, period: u64) -> PathBuf {
    root.join(format!("db{period}"))
}

fn snapshot_state_dir(root: &Path, period: u64) -> PathBuf {
    root.join(format!("state_db{period}"))
}

fn rebuild_backup(root: &Path) -> Result<(), ChronxError> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs();

    let live_db = db_dir(root);
    if live_db.exists() {
        let backup = root.join(format!("db-rebuild-backup-{ts}"));
        std::fs::rename(&live_db, &backup).map_err(|e| ChronxError::Storage(e.to_string()))?;
        info!(backup = %backup.display(), "rebuild: backed up live db");
    }
    let live_state = state_db_dir(root);
    if live_state.exists() {
        let backup = root.join(format!("state_db-rebuild-backup-{ts}"));
        std::fs::rename(&live_state, &backup).map_err(|e| ChronxError::Storage(e.to_string()))?;
        info!(backup = %backup.display(), "rebuild: backed up live state_db");
    }
    Ok(())
}

/// At startup, revert the working directory to the snapshot for `period`.
/// Fails without modifying state if that snapshot is absent. Newer snapshots
/// are deleted. The reverted-to snapshot is *copied* (not moved/renamed)
/// into the live directory, per spec Design Note 9 ("Implementations should
/// copy-then-consume so the reverted-to snapshot remains available for a
/// subsequent revert") — the source's approach of treating the snapshot
/// directory itself as the new live directory would make the next revert to
/// the same period impossible.
fn revert_directories_to_period(root: &Path, period: u64) -> Result<(), ChronxError> {
    let snap_db = snapshot_db_dir(root, period);
    if !snap_db.exists() {
        return Err(ChronxError::NotFound(format!(
            "no snapshot for period {period} at {}",
            snap_db.display()
        )));
    }

    for existing in discover_snapshots(root) {
        if existing > period {
            remove_dir_if_exists(&snapshot_db_dir(root, existing))?;
            remove_dir_if_exists(&snapshot_state_dir(root, existing))?;
        }
    }

    remove_dir_if_exists(&db_dir(root))?;
    copy_dir_recursive(&snap_db, &db_dir(root))?;

    let snap_state = snapshot_state_dir(root, period);
    if snap_state.exists() {
        remove_dir_if_exists(&state_db_dir(root))?;
        copy_dir_recursive(&snap_state, &state_db_dir(root))?;
    }

    info!(period, "reverted to period");
    Ok(())
}

fn discover_snapshots(root: &Path) -> BTreeSet<u64> {
    let mut out = BTreeSet::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return out;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(digits) = name.strip_prefix("db") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(period) = digits.parse::<u64>() {
                    out.insert(period);
                }
            }
        }
    }
    out
}

fn remove_dir_if_exists(path: &Path) -> Result<(), ChronxError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| ChronxError::Storage(e.to_string()))?;
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), ChronxError> {
    std::fs::create_dir_all(dst).map_err(|e| ChronxError::Storage(e.to_string()))?;
    for entry in std::fs::read_dir(src).map_err(|e| ChronxError::Storage(e.to_string()))? {
        let entry = entry.map_err(|e| ChronxError::Storage(e.to_string()))?;
        let file_type = entry
            .file_type()
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        let dst_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path).map_err(|e| ChronxError::Storage(e.to_string()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chronx_store_test_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn fresh_store_stamps_version() {
        let dir = scratch_dir("version");
        let store = Store::open(&dir, StoreConfig::default()).unwrap();
        assert!(!store.minor_version_drift());
        assert_eq!(
            store.status_get_u64(status_keys::DB_MAJOR_VERSION).unwrap(),
            Some(DB_MAJOR_VERSION as u64)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn batch_put_is_visible_after_commit() {
        let dir = scratch_dir("batch");
        let store = Store::open(&dir, StoreConfig::default()).unwrap();
        let mut batch = store.batch();
        batch.put(Column::Transactions, b"k1", b"v1");
        batch.put(Column::TrxStatus, b"k1", b"pending");
        batch.commit().unwrap();

        assert_eq!(store.get(Column::Transactions, b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(
            store.get(Column::TrxStatus, b"k1").unwrap(),
            Some(b"pending".to_vec())
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_then_revert_restores_period() {
        let dir = scratch_dir("snapshot");
        let config = StoreConfig {
            snapshot_stride: 1,
            max_snapshots: 10,
            ..StoreConfig::default()
        };
        {
            let store = Store::open(&dir, config.clone()).unwrap();
            store.insert(Column::Status, b"marker", b"period-1").unwrap();
            store.maybe_snapshot(1).unwrap();
            store.insert(Column::Status, b"marker", b"period-2").unwrap();
            store.maybe_snapshot(2).unwrap();
            assert_eq!(store.snapshot_periods(), vec![1, 2]);
        }

        let revert_config = StoreConfig {
            revert_to_period: Some(1),
            ..config
        };
        let store = Store::open(&dir, revert_config).unwrap();
        assert_eq!(
            store.get(Column::Status, b"marker").unwrap(),
            Some(b"period-1".to_vec())
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn revert_to_missing_snapshot_fails() {
        let dir = scratch_dir("revert_missing");
        {
            let _store = Store::open(&dir, StoreConfig::default()).unwrap();
        }
        let config = StoreConfig {
            revert_to_period: Some(99),
            ..StoreConfig::default()
        };
        assert!(Store::open(&dir, config).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_eviction_is_fifo() {
        let dir = scratch_dir("eviction");
        let config = StoreConfig {
            snapshot_stride: 2,
            max_snapshots: 2,
            ..StoreConfig::default()
        };
        let store = Store::open(&dir, config).unwrap();
        for period in [2u64, 4, 6] {
            store.maybe_snapshot(period).unwrap();
        }
        assert_eq!(store.snapshot_periods(), vec![4, 6]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
