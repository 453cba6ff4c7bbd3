use chronx_core::{Address, ChronxError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for seeding the genesis `DagBlock` on a fresh store.
///
/// There is no genesis allocation or account balance here: C6's
/// `StateTransition` collaborator owns whatever application state the
/// chain executes over, and genesis only needs to plant the sentinel
/// block C3/C4 anchor their preconditions on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisParams {
    /// Proposer address recorded on the genesis block.
    pub proposer: Address,
    /// Unix timestamp recorded on the genesis block.
    pub timestamp: i64,
}

impl GenesisParams {
    /// Load genesis parameters from a JSON file (the `--genesis-params` CLI option).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChronxError> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| ChronxError::Other(format!("reading genesis params: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ChronxError::Other(format!("parsing genesis params: {e}")))
    }
}
