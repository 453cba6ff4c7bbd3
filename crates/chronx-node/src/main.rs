//! chronx-node — the ChronX full-node binary.
//!
//! Wires every core component (spec §2) into one process:
//!   1. open the durable store (C1), applying any configured rebuild/revert
//!   2. seed genesis on a fresh store
//!   3. rebuild C3/C4/C5's in-memory indices from C1
//!   4. start C2's verifier workers and C6's executor thread
//!   5. start the P2P network and JSON-RPC server
//!   6. run the single-node proposer loop that stands in for the
//!      out-of-scope PBFT committee (see `proposer.rs`)

mod proposer;
mod transition;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use chronx_consensus::{PbftChain, ReplayConfig, ReplayProtector};
use chronx_core::constants::{
    DEFAULT_DAG_PROCESSING_THREADS, DEFAULT_EXPECTED_MAX_TRX_PER_BLOCK,
    DEFAULT_FINALIZATION_HORIZON, DEFAULT_REPLAY_WINDOW_PERIODS,
};
use chronx_crypto::{DilithiumRecovery, KeyPair, KeyRegistry};
use chronx_dag::{DagStore, DagStoreConfig};
use chronx_executor::{spawn_executor, Executor, ExecutionSubscriber, FinalizedPeriod};
use chronx_genesis::{apply_genesis, GenesisParams};
use chronx_p2p::{intake, P2pConfig, P2pMessage, P2pNetwork};
use chronx_rpc::server::RpcServerState;
use chronx_rpc::RpcServer;
use chronx_store::{Store, StoreConfig};
use chronx_txpool::{spawn_verifiers, TxPool, TxPoolConfig};

use transition::FoldingStateTransition;

#[derive(Parser, Debug)]
#[command(
    name = "chronx-node",
    version,
    about = "ChronX full node — block-DAG ordering with PBFT finality"
)]
struct Args {
    /// Node directory `D` (spec §6): holds `db/`, `state_db/`, and any
    /// snapshot/rebuild-backup siblings.
    #[arg(long, default_value = "~/.chronx/data")]
    data_dir: PathBuf,

    /// P2P listen multiaddress.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/7777")]
    p2p_listen: String,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,

    /// Bootstrap peer multiaddresses (comma-separated).
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<String>,

    /// Path to genesis params JSON (only consulted on a fresh store).
    #[arg(long)]
    genesis_params: Option<PathBuf>,

    /// `dag_processing_threads` (spec §6): C2 verifier worker count.
    #[arg(long, default_value_t = DEFAULT_DAG_PROCESSING_THREADS)]
    dag_processing_threads: usize,

    /// Finalization horizon: minimum pivot-chain level distance from the
    /// tip an anchor candidate must clear (spec §4.3).
    #[arg(long, default_value_t = DEFAULT_FINALIZATION_HORIZON)]
    finalization_horizon: u64,

    /// `db_snapshot_each_n_pbft_block`. 0 disables snapshotting.
    #[arg(long, default_value_t = 0)]
    db_snapshot_each_n_pbft_block: u64,

    /// `db_max_snapshots`.
    #[arg(long, default_value_t = 5)]
    db_max_snapshots: usize,

    /// `db_revert_to_period`. One-shot.
    #[arg(long)]
    db_revert_to_period: Option<u64>,

    /// `rebuild`: rename the current store aside and start fresh.
    #[arg(long, default_value_t = false)]
    rebuild: bool,

    /// `expected_max_trx_per_block` (C2's default pool snapshot capacity hint).
    #[arg(long, default_value_t = DEFAULT_EXPECTED_MAX_TRX_PER_BLOCK)]
    expected_max_trx_per_block: usize,

    /// `replay_window_periods` (C5).
    #[arg(long, default_value_t = DEFAULT_REPLAY_WINDOW_PERIODS)]
    replay_window_periods: u64,
}

/// Logs every finalized period instead of pushing it anywhere (spec §4.6's
/// "`WSServer` hook is an opaque sink... best-effort, the core does not
/// retain unsent notifications across restart" — a real websocket push
/// belongs to the out-of-scope RPC layer, not this binary's minimal wiring).
struct LoggingSubscriber;

impl ExecutionSubscriber for LoggingSubscriber {
    fn notify(&self, finalized: &FinalizedPeriod) {
        info!(
            period = finalized.period,
            anchor = %finalized.anchor,
            applied = finalized.receipts.len(),
            reverted = finalized.reverted.len(),
            state_root = %finalized.state_root,
            "period finalized"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chronx=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("chronx node starting");

    // ── C1: durable store ──────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    let store_config = StoreConfig {
        snapshot_stride: args.db_snapshot_each_n_pbft_block,
        max_snapshots: args.db_max_snapshots,
        revert_to_period: args.db_revert_to_period,
        rebuild: args.rebuild,
    };
    let store = Arc::new(
        Store::open(&data_dir, store_config).with_context(|| {
            format!("opening store at {}", data_dir.display())
        })?,
    );
    if store.minor_version_drift() {
        warn!("on-disk minor schema version differs from the binary's — proceeding without migration");
    }

    // ── C3: DAG store, seeded with genesis on a fresh node ────────────────
    let dag = Arc::new(
        DagStore::open(store.clone(), DagStoreConfig::default()).context("opening dag store")?,
    );
    if dag.pivot_chain().is_empty() {
        let params = load_or_generate_genesis_params(args.genesis_params.as_deref())?;
        apply_genesis(&dag, &params).context("applying genesis")?;
    } else {
        info!("existing dag store found — skipping genesis");
    }

    // ── C4 / C5 ────────────────────────────────────────────────────────────
    let pbft = Arc::new(PbftChain::open(store.clone()).context("opening pbft chain")?);
    let replay = Arc::new(
        ReplayProtector::open(
            store.clone(),
            ReplayConfig { window_periods: args.replay_window_periods },
        )
        .context("opening replay protector")?,
    );

    // ── C2: transaction pool + verifier workers ───────────────────────────
    let pool = Arc::new(TxPool::new(TxPoolConfig {
        expected_max_trx_per_block: args.expected_max_trx_per_block,
    }));
    let key_registry = Arc::new(KeyRegistry::new());
    let recovery = Arc::new(DilithiumRecovery::new(key_registry.clone()));
    let _verifier_handles = spawn_verifiers(pool.clone(), recovery, args.dag_processing_threads);

    // ── This node's own keypair (PBFT/DAG block proposer identity) ───────
    let keypair = Arc::new(KeyPair::generate());
    info!(address = %keypair.address, "node proposer identity generated");

    // ── C6: executor thread ───────────────────────────────────────────────
    let transition = Arc::new(FoldingStateTransition::new());
    let executor = Arc::new(Executor::new(
        store.clone(),
        dag.clone(),
        pbft.clone(),
        replay,
        pool.clone(),
        transition,
        Arc::new(LoggingSubscriber) as Arc<dyn ExecutionSubscriber>,
    ));
    // Catch up on anything left unexecuted from a prior run before serving
    // traffic (spec §4.6 "Idempotence": restart resumes at the first
    // unexecuted period).
    executor.drain().context("draining unexecuted periods at startup")?;
    let (_executor_handle, _executor_stopped) = spawn_executor(executor);

    // ── P2P network ────────────────────────────────────────────────────────
    let p2p_config = P2pConfig {
        listen_addr: args.p2p_listen.clone(),
        bootstrap_peers: args.bootstrap.clone(),
        protocol_version: "/chronx/1.0.0".into(),
        blocks_topic: "chronx-blocks".into(),
    };
    let (p2p_network, mut p2p_handle) =
        P2pNetwork::new(&p2p_config).map_err(|e| anyhow::anyhow!("building P2P network: {e}"))?;
    info!(peer_id = %p2p_handle.local_peer_id, "P2P identity");

    let peer_multiaddr = format!("{}/p2p/{}", p2p_config.listen_addr, p2p_handle.local_peer_id);
    let outbound_tx = p2p_handle.outbound_tx.clone();

    // Translate inbound gossip into C2/C3/C4 calls.
    let dag_for_intake = dag.clone();
    let pbft_for_intake = pbft.clone();
    let pool_for_intake = pool.clone();
    let registry_for_intake = key_registry.clone();
    tokio::spawn(async move {
        while let Some(msg) = p2p_handle.inbound_rx.recv().await {
            match msg {
                P2pMessage::NewTransaction { tx, sender_public_key } => {
                    if let Err(e) = intake::handle_new_transaction(
                        &pool_for_intake,
                        &registry_for_intake,
                        tx,
                        sender_public_key,
                    ) {
                        warn!(error = %e, "p2p: rejected gossiped transaction");
                    }
                }
                P2pMessage::NewDagBlock { block, transactions } => {
                    if let Err(e) = intake::handle_dag_block(&dag_for_intake, block, transactions) {
                        warn!(error = %e, "p2p: rejected gossiped dag block");
                    }
                }
                P2pMessage::NewPbftBlock { block, cert_votes } => {
                    if let Err(e) = intake::handle_pbft_block(
                        &dag_for_intake,
                        &pbft_for_intake,
                        block,
                        cert_votes,
                    ) {
                        warn!(error = %e, "p2p: rejected gossiped pbft block");
                    }
                }
                P2pMessage::RequestDagBlock { .. }
                | P2pMessage::SyncTips { .. }
                | P2pMessage::RequestTips => {
                    // Sync/discovery messages: out of scope for the core
                    // (spec §1 disclaims peer/sync protocol details).
                }
            }
        }
    });

    tokio::spawn(async move { p2p_network.run().await });

    // ── RPC server ─────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        store: store.clone(),
        dag: dag.clone(),
        pbft: pbft.clone(),
        pool: pool.clone(),
        key_registry,
        peer_multiaddr: Some(peer_multiaddr),
    });
    let _rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Single-node proposer loop (stand-in for the committee; see
    // `proposer.rs`'s doc comment) ─────────────────────────────────────────
    info!("node ready");
    proposer::run(dag, pbft, pool, keypair, outbound_tx, args.finalization_horizon).await;

    Ok(())
}

/// Load genesis parameters from a JSON file, or generate an ephemeral
/// proposer identity if no path is given.
fn load_or_generate_genesis_params(path: Option<&Path>) -> anyhow::Result<GenesisParams> {
    if let Some(p) = path {
        return GenesisParams::load(p).map_err(|e| anyhow::anyhow!("{e}"));
    }
    warn!("no --genesis-params provided — generating an ephemeral genesis, not reproducible across nodes");
    let kp = KeyPair::generate();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    Ok(GenesisParams { proposer: kp.address, timestamp })
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
