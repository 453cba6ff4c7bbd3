use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use chronx_consensus::PbftChain;
use chronx_core::{Hash, Transaction, TransactionStatus};
use chronx_crypto::KeyRegistry;
use chronx_dag::DagStore;
use chronx_executor::TransactionReceipt;
use chronx_store::{Column, Store};
use chronx_txpool::TxPool;

use crate::api::ChronxApiServer;
use crate::types::{
    RpcDagBlock, RpcLevelBlocks, RpcPbftBlock, RpcPbftHead, RpcPoolSizes, RpcReceipt,
    RpcStatusCounters, RpcTransaction,
};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn parse_hash(hex: &str) -> Result<Hash, ErrorObject<'static>> {
    Hash::from_hex(hex).map_err(|e| rpc_err(-32602, format!("invalid hash: {e}")))
}

/// Shared state passed to the RPC server: read-only handles on C1/C3/C4/C2.
pub struct RpcServerState {
    pub store: Arc<Store>,
    pub dag: Arc<DagStore>,
    pub pbft: Arc<PbftChain>,
    pub pool: Arc<TxPool>,
    /// Sender address → public key directory fed by `submitTransaction`'s
    /// optional key hex, shared with C2's verifier workers.
    pub key_registry: Arc<KeyRegistry>,
    /// Full libp2p multiaddress of this node, if known. Surfaced over RPC via
    /// `getNetworkInfo` so peers can discover how to dial this node.
    pub peer_multiaddr: Option<String>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

fn tx_to_rpc(tx: Transaction) -> RpcTransaction {
    RpcTransaction {
        hash: tx.hash.to_hex(),
        nonce: tx.nonce,
        sender: tx.sender.to_hex(),
        to: tx.to.to_hex(),
        value: tx.value.to_string(),
        gas: tx.gas,
        gas_price: tx.gas_price,
        data: hex::encode(&tx.data),
    }
}

fn receipt_to_rpc(r: TransactionReceipt) -> RpcReceipt {
    RpcReceipt {
        tx_hash: r.tx_hash.to_hex(),
        success: r.success,
        gas_used: r.gas_used,
        output: hex::encode(&r.output),
    }
}

#[async_trait]
impl ChronxApiServer for RpcServer {
    async fn submit_transaction(
        &self,
        tx_hex: String,
        sender_public_key_hex: Option<String>,
    ) -> RpcResult<String> {
        let tx_bytes =
            hex::decode(&tx_hex).map_err(|e| rpc_err(-32602, format!("invalid hex: {e}")))?;
        let tx: Transaction = bincode::deserialize(&tx_bytes)
            .map_err(|e| rpc_err(-32602, format!("invalid transaction encoding: {e}")))?;

        if !tx.hash_is_consistent() {
            return Err(rpc_err(-32602, "transaction hash does not match its body").into());
        }

        if let Some(pk_hex) = sender_public_key_hex {
            let pk_bytes = hex::decode(&pk_hex)
                .map_err(|e| rpc_err(-32602, format!("invalid public key hex: {e}")))?;
            if !self.state.key_registry.register(tx.sender, chronx_core::PublicKey(pk_bytes)) {
                return Err(rpc_err(-32602, "public key does not match claimed sender").into());
            }
        }

        let hash_hex = tx.hash.to_hex();
        if let Err(e) = self.state.pool.insert(tx, true) {
            warn!(hash = %hash_hex, error = %e, "submitTransaction: pool rejected transaction");
            return Err(rpc_err(-32603, e.to_string()).into());
        }
        Ok(hash_hex)
    }

    async fn get_transaction(&self, hash_hex: String) -> RpcResult<Option<RpcTransaction>> {
        let hash = parse_hash(&hash_hex)?;

        if let Some(tx) = self.state.pool.get(&hash) {
            return Ok(Some(tx_to_rpc(tx)));
        }

        let tx: Option<Transaction> = self
            .state
            .store
            .get_decoded(Column::Transactions, hash.as_bytes())
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(tx.map(tx_to_rpc))
    }

    async fn get_transaction_status(&self, hash_hex: String) -> RpcResult<Option<String>> {
        let hash = parse_hash(&hash_hex)?;

        let persisted: Option<TransactionStatus> = self
            .state
            .store
            .get_decoded(Column::TrxStatus, hash.as_bytes())
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        if let Some(status) = persisted {
            return Ok(Some(format!("{status:?}")));
        }

        if self.state.pool.get(&hash).is_some() {
            return Ok(Some("InPool".to_string()));
        }

        Ok(None)
    }

    async fn get_receipt(&self, hash_hex: String) -> RpcResult<Option<RpcReceipt>> {
        let hash = parse_hash(&hash_hex)?;
        let receipt: Option<TransactionReceipt> = self
            .state
            .store
            .get_decoded(Column::Receipts, hash.as_bytes())
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(receipt.map(receipt_to_rpc))
    }

    async fn get_dag_block(&self, hash_hex: String) -> RpcResult<Option<RpcDagBlock>> {
        let hash = parse_hash(&hash_hex)?;
        let Some(block) = self.state.dag.block(&hash) else {
            return Ok(None);
        };
        let finalized = self
            .state
            .dag
            .all_block_states()
            .get(&hash)
            .copied()
            .unwrap_or(false);

        Ok(Some(RpcDagBlock {
            hash: block.hash.to_hex(),
            pivot: block.pivot.to_hex(),
            tips: block.tips.iter().map(|h| h.to_hex()).collect(),
            level: block.level,
            timestamp: block.timestamp,
            proposer: block.proposer.to_hex(),
            transactions: block.transactions.iter().map(|h| h.to_hex()).collect(),
            finalized,
        }))
    }

    async fn get_blocks_at_level(&self, level: u64, n: u64) -> RpcResult<Vec<RpcLevelBlocks>> {
        Ok(self
            .state
            .dag
            .blocks_at_level(level, n)
            .into_iter()
            .map(|(level, hashes)| RpcLevelBlocks {
                level,
                hashes: hashes.iter().map(|h| h.to_hex()).collect(),
            })
            .collect())
    }

    async fn get_pivot_chain(&self) -> RpcResult<Vec<String>> {
        Ok(self
            .state
            .dag
            .pivot_chain()
            .iter()
            .map(|h| h.to_hex())
            .collect())
    }

    async fn get_pbft_head(&self) -> RpcResult<RpcPbftHead> {
        let head = self.state.pbft.head();
        Ok(RpcPbftHead {
            hash: head.hash.to_hex(),
            period: head.period,
        })
    }

    async fn get_pbft_block(&self, hash_hex: String) -> RpcResult<Option<RpcPbftBlock>> {
        let hash = parse_hash(&hash_hex)?;
        let block = self
            .state
            .pbft
            .pbft_block(&hash)
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(block.map(|b| RpcPbftBlock {
            hash: b.hash.to_hex(),
            parent: b.parent.to_hex(),
            period: b.period,
            anchor: b.anchor.to_hex(),
            proposer: b.proposer.to_hex(),
            timestamp: b.timestamp,
        }))
    }

    async fn get_period_block(&self, period: u64) -> RpcResult<Option<String>> {
        let hash = self
            .state
            .pbft
            .period_block(period)
            .map_err(|e| rpc_err(-32603, e.to_string()))?;
        Ok(hash.map(|h| h.to_hex()))
    }

    async fn get_status_counters(&self) -> RpcResult<RpcStatusCounters> {
        let store = &self.state.store;
        Ok(RpcStatusCounters {
            dag_blk_count: store
                .dag_blk_count()
                .map_err(|e| rpc_err(-32603, e.to_string()))?,
            dag_edge_count: store
                .dag_edge_count()
                .map_err(|e| rpc_err(-32603, e.to_string()))?,
            num_executed_blocks: store
                .num_executed_blocks()
                .map_err(|e| rpc_err(-32603, e.to_string()))?,
            num_executed_trx: store
                .num_executed_trx()
                .map_err(|e| rpc_err(-32603, e.to_string()))?,
        })
    }

    async fn get_pool_sizes(&self) -> RpcResult<RpcPoolSizes> {
        let sizes = self.state.pool.size();
        Ok(RpcPoolSizes {
            verified: sizes.verified,
            unverified: sizes.unverified,
        })
    }

    async fn get_network_info(&self) -> RpcResult<Option<String>> {
        Ok(self.state.peer_multiaddr.clone())
    }
}
