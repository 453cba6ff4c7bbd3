//! P2P integration test for chronx-node.
//!
//! Starts two node processes:
//!   Node A — bootstrap node (no peers)
//!   Node B — joins by dialing node A
//!
//! Submits a transaction to node A and verifies that node B receives it via
//! GossipSub and eventually agrees that it is finalized.
//!
//! Run with:
//!   cargo test -p chronx-node --test p2p

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use chronx_core::types::{Address, Hash, Signature};
use chronx_core::Transaction;
use chronx_crypto::KeyPair;

// ── Node lifecycle ──────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ──────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> Option<serde_json::Value> {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client.post(url).json(&body).send().await.ok()?;
    let json: serde_json::Value = resp.json().await.ok()?;
    if json.get("error").is_some() {
        return None;
    }
    Some(json["result"].clone())
}

async fn rpc_call_unwrap(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    rpc_call(client, url, method, params)
        .await
        .unwrap_or_else(|| panic!("RPC call {method} returned error/none"))
}

async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "chronx_getPivotChain",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

async fn get_peer_multiaddr(client: &reqwest::Client, url: &str) -> String {
    let result = rpc_call_unwrap(client, url, "chronx_getNetworkInfo", serde_json::json!([])).await;
    result.as_str().expect("peer multiaddr string").to_string()
}

async fn get_status(client: &reqwest::Client, url: &str, hash_hex: &str) -> Option<String> {
    rpc_call(client, url, "chronx_getTransactionStatus", serde_json::json!([hash_hex]))
        .await
        .and_then(|v| v.as_str().map(|s| s.to_string()))
}

async fn submit_tx(
    client: &reqwest::Client,
    url: &str,
    tx: &Transaction,
    sender_public_key_hex: &str,
) -> String {
    let bytes = bincode::serialize(tx).unwrap();
    let tx_hex = hex::encode(bytes);
    let result = rpc_call_unwrap(
        client,
        url,
        "chronx_submitTransaction",
        serde_json::json!([tx_hex, sender_public_key_hex]),
    )
    .await;
    result.as_str().unwrap().to_string()
}

/// Poll until `method` reports `status` on the given node.
async fn wait_for_status(
    client: &reqwest::Client,
    url: &str,
    hash_hex: &str,
    status: &str,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if get_status(client, url, hash_hex).await.as_deref() == Some(status) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    false
}

// ── Transaction builder ──────────────────────────────────────────────────────

fn build_tx(kp: &KeyPair, nonce: u64, to: Address, value: u128) -> Transaction {
    let mut tx = Transaction {
        hash: Hash::GENESIS,
        nonce,
        sender: kp.address,
        to,
        value,
        gas: 21_000,
        gas_price: 1,
        data: vec![],
        signature: Signature(vec![]),
    };
    tx.hash = tx.compute_hash();
    tx.signature = kp.sign(&tx.body_bytes());
    tx
}

// ── Helpers to spawn nodes ───────────────────────────────────────────────────

fn spawn_node(data_dir: &PathBuf, rpc_port: u16, p2p_port: u16, bootstrap: Option<&str>) -> Child {
    let node_bin = env!("CARGO_BIN_EXE_chronx-node");
    let mut cmd = Command::new(node_bin);
    cmd.args([
        "--data-dir",
        data_dir.join("state").to_str().unwrap(),
        "--rpc-addr",
        &format!("127.0.0.1:{}", rpc_port),
        "--p2p-listen",
        &format!("/ip4/127.0.0.1/tcp/{}", p2p_port),
        "--finalization-horizon",
        "0",
    ]);
    if let Some(bs) = bootstrap {
        cmd.args(["--bootstrap", bs]);
    }
    cmd.stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn chronx-node")
}

// ── P2P test ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn p2p_gossip_propagation() {
    let http = reqwest::Client::new();

    // Each node seeds its own ephemeral genesis; genesis blocks are always
    // keyed on the fixed sentinel hash regardless of proposer/timestamp
    // (see `DagStore::seed_genesis`), so the two nodes still agree on the
    // DAG root without sharing a genesis-params file.
    let base_dir = std::env::temp_dir().join(format!("chronx_p2p_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&base_dir);

    let dir_a = base_dir.join("node_a");
    let dir_b = base_dir.join("node_b");
    std::fs::create_dir_all(&dir_a).unwrap();
    std::fs::create_dir_all(&dir_b).unwrap();

    // ── 1. Start node A (bootstrap node, no peers) ────────────────────────────
    let rpc_a = free_port();
    let p2p_a = free_port();
    let url_a = format!("http://127.0.0.1:{}", rpc_a);

    let child_a = spawn_node(&dir_a, rpc_a, p2p_a, None);
    let _guard_a = NodeGuard { child: child_a, data_dir: dir_a };

    assert!(
        wait_for_rpc(&http, &url_a, Duration::from_secs(20)).await,
        "node A did not become ready"
    );

    // ── 2. Discover node A's peer multiaddr ───────────────────────────────────
    let peer_multiaddr_a = get_peer_multiaddr(&http, &url_a).await;
    assert!(
        peer_multiaddr_a.contains("/p2p/"),
        "expected /p2p/ in multiaddr, got: {peer_multiaddr_a}"
    );

    // ── 3. Start node B, bootstrapping off node A ─────────────────────────────
    let rpc_b = free_port();
    let p2p_b = free_port();
    let url_b = format!("http://127.0.0.1:{}", rpc_b);

    let child_b = spawn_node(&dir_b, rpc_b, p2p_b, Some(&peer_multiaddr_a));
    let _guard_b = NodeGuard { child: child_b, data_dir: base_dir };

    assert!(
        wait_for_rpc(&http, &url_b, Duration::from_secs(20)).await,
        "node B did not become ready"
    );

    // GossipSub mesh formation + identify/kademlia address exchange takes a
    // few heartbeats.
    tokio::time::sleep(Duration::from_secs(4)).await;

    // ── 4. Submit a transaction on node A ─────────────────────────────────────
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let tx = build_tx(&alice, 0, bob.address, 500);
    let hash_hex = submit_tx(&http, &url_a, &tx, &hex::encode(&alice.public_key.0)).await;

    // ── 5. Node A finalizes it locally ────────────────────────────────────────
    assert!(
        wait_for_status(&http, &url_a, &hash_hex, "Finalized", Duration::from_secs(20)).await,
        "node A did not finalize the transaction"
    );

    // ── 6. Node B receives and finalizes it via GossipSub relay ──────────────
    assert!(
        wait_for_status(&http, &url_b, &hash_hex, "Finalized", Duration::from_secs(20)).await,
        "node B did not receive/finalize the transaction via GossipSub within 20 seconds"
    );

    // ── 7. Both nodes agree the receipt succeeded ─────────────────────────────
    let receipt_a = rpc_call_unwrap(&http, &url_a, "chronx_getReceipt", serde_json::json!([hash_hex])).await;
    let receipt_b = rpc_call_unwrap(&http, &url_b, "chronx_getReceipt", serde_json::json!([hash_hex])).await;
    assert!(receipt_a["success"].as_bool().unwrap());
    assert!(receipt_b["success"].as_bool().unwrap());
}
