use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    RpcDagBlock, RpcLevelBlocks, RpcPbftBlock, RpcPbftHead, RpcPoolSizes, RpcReceipt,
    RpcStatusCounters, RpcTransaction,
};

/// ChronX JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "chronx_" via `namespace = "chronx"`.
/// This is a read-only query surface plus transaction submission; there is
/// no committee/voting RPC surface (spec §1/§2 disclaim it).
#[rpc(server, namespace = "chronx")]
pub trait ChronxApi {
    /// Submit a signed transaction. `tx_hex` is hex-encoded bincode(Transaction).
    /// `sender_public_key_hex`, if given, registers the sender's public key
    /// (see `chronx_crypto::KeyRegistry`) so C2's verifier workers can
    /// authenticate it; omit it once a sender's key is already known.
    /// Returns the transaction hash hex on success. Admission is async: the
    /// transaction is queued for C2's verifier pool, not yet finalized.
    #[method(name = "submitTransaction")]
    async fn submit_transaction(
        &self,
        tx_hex: String,
        sender_public_key_hex: Option<String>,
    ) -> RpcResult<String>;

    /// Get a transaction by its hash hex, wherever it currently lives
    /// (pool or durable store).
    #[method(name = "getTransaction")]
    async fn get_transaction(&self, hash_hex: String) -> RpcResult<Option<RpcTransaction>>;

    /// Get a transaction's lifecycle status
    /// (`NotSeen`/`InPool`/`InBlock`/`Finalized`/`Reverted`).
    #[method(name = "getTransactionStatus")]
    async fn get_transaction_status(&self, hash_hex: String) -> RpcResult<Option<String>>;

    /// Get the execution receipt for a finalized transaction.
    #[method(name = "getReceipt")]
    async fn get_receipt(&self, hash_hex: String) -> RpcResult<Option<RpcReceipt>>;

    /// Get a DAG block by hash hex.
    #[method(name = "getDagBlock")]
    async fn get_dag_block(&self, hash_hex: String) -> RpcResult<Option<RpcDagBlock>>;

    /// Get up to `n` consecutive DAG levels starting at `level`.
    #[method(name = "getBlocksAtLevel")]
    async fn get_blocks_at_level(&self, level: u64, n: u64) -> RpcResult<Vec<RpcLevelBlocks>>;

    /// Get the current pivot chain, genesis-first.
    #[method(name = "getPivotChain")]
    async fn get_pivot_chain(&self) -> RpcResult<Vec<String>>;

    /// Get the PBFT chain head (hash, period).
    #[method(name = "getPbftHead")]
    async fn get_pbft_head(&self) -> RpcResult<RpcPbftHead>;

    /// Get a PBFT block by hash hex.
    #[method(name = "getPbftBlock")]
    async fn get_pbft_block(&self, hash_hex: String) -> RpcResult<Option<RpcPbftBlock>>;

    /// Get the PBFT block hash finalized for `period`, if any.
    #[method(name = "getPeriodBlock")]
    async fn get_period_block(&self, period: u64) -> RpcResult<Option<String>>;

    /// Get the process-wide status counters persisted in C1.
    #[method(name = "getStatusCounters")]
    async fn get_status_counters(&self) -> RpcResult<RpcStatusCounters>;

    /// Get the current C2 pool sizes (verified/unverified).
    #[method(name = "getPoolSizes")]
    async fn get_pool_sizes(&self) -> RpcResult<RpcPoolSizes>;

    /// Get this node's full libp2p multiaddress (`/ip4/.../tcp/.../p2p/...`),
    /// if the node wiring provided one. Used by peers bootstrapping against
    /// this node (spec §1 disclaims the P2P layer itself; this only exposes
    /// the address another out-of-scope collaborator needs to dial it).
    #[method(name = "getNetworkInfo")]
    async fn get_network_info(&self) -> RpcResult<Option<String>>;
}
