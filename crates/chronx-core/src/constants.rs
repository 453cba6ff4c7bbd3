//! Protocol-wide constants for the DAG/PBFT core.

use crate::types::Hash;

/// The genesis block hash: every pivot chain starts here.
pub const GENESIS_HASH: Hash = Hash::GENESIS;

/// Minimum parent references per non-genesis DAG block.
pub const DAG_MIN_PARENTS: usize = 1;

/// Maximum parent references per DAG block.
pub const DAG_MAX_PARENTS: usize = 8;

/// Default number of C2 verifier worker threads when unconfigured.
pub const DEFAULT_DAG_PROCESSING_THREADS: usize = 4;

/// Default finalization horizon (minimum level distance from the pivot tip)
/// used by anchor selection when the node does not override it.
pub const DEFAULT_FINALIZATION_HORIZON: u64 = 5;

/// Default number of recent periods the replay-protection window retains.
pub const DEFAULT_REPLAY_WINDOW_PERIODS: u64 = 64;

/// Default pool snapshot capacity hint (`expected_max_trx_per_block`).
pub const DEFAULT_EXPECTED_MAX_TRX_PER_BLOCK: usize = 2_000;

/// On-disk schema version. Bumped on breaking column-layout changes.
pub const DB_MAJOR_VERSION: u32 = 1;
/// Minor schema revision. Drift is tolerated; see `ChronxError::VersionMismatch`.
pub const DB_MINOR_VERSION: u32 = 0;
