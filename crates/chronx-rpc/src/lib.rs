//! chronx-rpc
//!
//! JSON-RPC 2.0 server for ChronX nodes: a read-only query surface over
//! C1/C3/C4 plus transaction submission into C2. There is no committee or
//! voting RPC surface (spec §1/§2 disclaim that machinery entirely).
//!
//! Namespace: "chronx"
//! Methods:
//!   chronx_submitTransaction    — admit a signed transaction into the pool
//!   chronx_getTransaction       — look up a transaction by hash hex
//!   chronx_getTransactionStatus — lifecycle status of a transaction
//!   chronx_getReceipt           — execution receipt of a finalized transaction
//!   chronx_getDagBlock          — a DAG block by hash hex
//!   chronx_getBlocksAtLevel     — DAG blocks at a level range
//!   chronx_getPivotChain        — the current pivot chain
//!   chronx_getPbftHead          — the PBFT chain head
//!   chronx_getPbftBlock         — a PBFT block by hash hex
//!   chronx_getPeriodBlock       — the PBFT block hash pinned to a period
//!   chronx_getStatusCounters    — process-wide counters persisted in C1
//!   chronx_getPoolSizes         — current C2 pool sizes

pub mod api;
pub mod server;
pub mod types;

pub use server::RpcServer;
pub use server::RpcServerState;
pub use types::{
    RpcDagBlock, RpcLevelBlocks, RpcPbftBlock, RpcPbftHead, RpcPoolSizes, RpcReceipt,
    RpcStatusCounters, RpcTransaction,
};
