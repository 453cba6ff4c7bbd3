use serde::{Deserialize, Serialize};

/// JSON-serializable transaction, hex-encoding every binary field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    pub nonce: u64,
    pub sender: String,
    pub to: String,
    pub value: String,
    pub gas: u64,
    pub gas_price: u64,
    pub data: String,
}

/// JSON-serializable DAG block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDagBlock {
    pub hash: String,
    pub pivot: String,
    pub tips: Vec<String>,
    pub level: u64,
    pub timestamp: i64,
    pub proposer: String,
    pub transactions: Vec<String>,
    pub finalized: bool,
}

/// JSON-serializable PBFT block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPbftBlock {
    pub hash: String,
    pub parent: String,
    pub period: u64,
    pub anchor: String,
    pub proposer: String,
    pub timestamp: i64,
}

/// Current PBFT chain head, returned by `getPbftHead`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPbftHead {
    pub hash: String,
    pub period: u64,
}

/// A level and the block hashes recorded at it, for `getBlocksAtLevel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcLevelBlocks {
    pub level: u64,
    pub hashes: Vec<String>,
}

/// Per-transaction execution outcome, returned by `getReceipt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub gas_used: u64,
    pub output: String,
}

/// Process-wide counters persisted in C1, returned by `getStatusCounters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcStatusCounters {
    pub dag_blk_count: u64,
    pub dag_edge_count: u64,
    pub num_executed_blocks: u64,
    pub num_executed_trx: u64,
}

/// C2 pool size snapshot, returned by `getPoolSizes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPoolSizes {
    pub verified: usize,
    pub unverified: usize,
}
