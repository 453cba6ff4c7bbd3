use thiserror::Error;

/// The error taxonomy carried by results across every component boundary.
///
/// See spec §7: most kinds are recoverable locally by the caller; `Corrupt`
/// and `VersionMismatch` are fatal and the caller is expected to terminate
/// the process rather than attempt to continue on inconsistent state.
#[derive(Debug, Error)]
pub enum ChronxError {
    /// Key absent in C1. Callers treat this as "does not exist", not an error
    /// to propagate further.
    #[error("not found: {0}")]
    NotFound(String),

    /// A decoded entity fails an invariant (bad encoding, inconsistent
    /// cross-reference). Fatal: the process should terminate naming the key.
    #[error("corrupt entry at {0}")]
    Corrupt(String),

    /// Major on-disk schema version differs from the binary's. Fatal at
    /// startup.
    #[error("version mismatch: on-disk {on_disk_major}.{on_disk_minor}, binary {binary_major}.{binary_minor}")]
    VersionMismatch {
        on_disk_major: u32,
        on_disk_minor: u32,
        binary_major: u32,
        binary_minor: u32,
    },

    /// A structural precondition was violated (duplicate period, missing
    /// parent, PBFT parent/period mismatch, malformed DAG block). Rejected at
    /// the caller's boundary; peer-originated messages should penalize the
    /// source.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Signature verification failed. Local to C2; the transaction moves to
    /// `rejected`.
    #[error("invalid signature")]
    SignatureInvalid,

    /// A transaction's `(sender, nonce)` was already finalized within the
    /// replay window. Local to C5/C6; the transaction is recorded as
    /// `reverted`, never applied.
    #[error("replayed transaction: sender already used this nonce")]
    Replay,

    /// The component has been stopped; no new operations are accepted.
    #[error("shutting down")]
    ShuttingDown,

    /// Underlying storage engine failure (sled I/O, snapshot copy, etc).
    #[error("storage error: {0}")]
    Storage(String),

    /// (De)serialization failure (bincode/serde_json).
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("too few parents: need at least {min}, got {got}")]
    TooFewParents { min: usize, got: usize },

    #[error("too many parents: max {max}, got {got}")]
    TooManyParents { max: usize, got: usize },

    #[error("{0}")]
    Other(String),
}

impl From<bincode::Error> for ChronxError {
    fn from(e: bincode::Error) -> Self {
        ChronxError::Serialization(e.to_string())
    }
}

impl From<sled::Error> for ChronxError {
    fn from(e: sled::Error) -> Self {
        ChronxError::Storage(e.to_string())
    }
}
