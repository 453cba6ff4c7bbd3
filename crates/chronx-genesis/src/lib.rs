//! chronx-genesis
//!
//! Seeds the genesis `DagBlock` (hash = level = the zero sentinel, no real
//! parents) on a fresh store, giving C3's pivot chain and C4's implicit
//! period-0 head a concrete origin. `DagStore::seed_genesis` is already
//! idempotent, so `apply_genesis` is safe to call on every node startup —
//! only the first call on an empty store has any effect.

pub mod params;

pub use params::GenesisParams;

use chronx_core::ChronxError;
use chronx_dag::DagStore;
use std::sync::Arc;
use tracing::info;

/// Seed the genesis `DagBlock` on `dag` if it is not already present.
///
/// This is the one and only place a block is ever written without a real
/// parent or proposer signature — every other `DagBlock` must validate
/// against C3's shape rules.
pub fn apply_genesis(dag: &Arc<DagStore>, params: &GenesisParams) -> Result<(), ChronxError> {
    dag.seed_genesis(params.proposer, params.timestamp)?;
    info!(proposer = %params.proposer, timestamp = params.timestamp, "genesis block seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_dag::DagStoreConfig;
    use chronx_store::{Store, StoreConfig};

    fn test_params() -> GenesisParams {
        GenesisParams {
            proposer: chronx_core::Address([7u8; 20]),
            timestamp: 1_800_000_000,
        }
    }

    #[test]
    fn genesis_seeds_pivot_chain() {
        let dir = std::env::temp_dir().join(format!("chronx_genesis_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir, StoreConfig::default()).unwrap());
        let dag = Arc::new(DagStore::open(store, DagStoreConfig::default()).unwrap());
        let params = test_params();

        apply_genesis(&dag, &params).expect("genesis must succeed");

        assert_eq!(dag.pivot_chain(), vec![chronx_core::Hash::GENESIS]);

        // Calling again is a no-op, not an error.
        apply_genesis(&dag, &params).expect("genesis must be idempotent");
        assert_eq!(dag.pivot_chain(), vec![chronx_core::Hash::GENESIS]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
