//! End-to-end smoke test for chronx-node.
//!
//! Starts a real node process against a fresh store, submits a signed
//! transaction via JSON-RPC, and waits for it to reach a finalized receipt.
//!
//! Run with:
//!   cargo test -p chronx-node --test smoke

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

/// Find a free TCP port on loopback.
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
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll until the RPC server responds or the timeout elapses.
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

async fn get_status(client: &reqwest::Client, url: &str, hash_hex: &str) -> Option<String> {
    let result = rpc_call(
        client,
        url,
        "chronx_getTransactionStatus",
        serde_json::json!([hash_hex]),
    )
    .await;
    result.as_str().map(|s| s.to_string())
}

async fn submit_tx(
    client: &reqwest::Client,
    url: &str,
    tx: &Transaction,
    sender_public_key_hex: &str,
) -> String {
    let bytes = bincode::serialize(tx).expect("serialize tx");
    let tx_hex = hex::encode(bytes);
    let result = rpc_call(
        client,
        url,
        "chronx_submitTransaction",
        serde_json::json!([tx_hex, sender_public_key_hex]),
    )
    .await;
    result.as_str().expect("tx hash string").to_string()
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

// ── Smoke test ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_submit_transaction_reaches_finalized_receipt() {
    let data_dir = std::env::temp_dir().join(format!("chronx_smoke_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let rpc_port = free_port();
    let p2p_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{}", rpc_port);

    let node_bin = env!("CARGO_BIN_EXE_chronx-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",
            data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",
            &format!("127.0.0.1:{}", rpc_port),
            "--p2p-listen",
            &format!("/ip4/127.0.0.1/tcp/{}", p2p_port),
            // With the default horizon (5), a single pivot-chain block never
            // clears the finalization window in this short test; 0 makes any
            // new block past the previous anchor immediately eligible.
            "--finalization-horizon",
            "0",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn chronx-node");

    let _guard = NodeGuard { child, data_dir };

    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
        "chronx-node did not become ready within 20 seconds"
    );

    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let tx = build_tx(&alice, 0, bob.address, 1_000);
    let hash_hex = submit_tx(
        &http,
        &rpc_url,
        &tx,
        &hex::encode(&alice.public_key.0),
    )
    .await;
    assert_eq!(hash_hex, tx.hash.to_hex());

    // Poll for the proposer (ticking every 2s) to pick up the tx, finalize a
    // period pinning it, and the executor to apply it.
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut last_status = None;
    while Instant::now() < deadline {
        last_status = get_status(&http, &rpc_url, &hash_hex).await;
        if last_status.as_deref() == Some("Finalized") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    assert_eq!(
        last_status.as_deref(),
        Some("Finalized"),
        "transaction did not reach Finalized status in time"
    );

    let receipt = rpc_call(
        &http,
        &rpc_url,
        "chronx_getReceipt",
        serde_json::json!([hash_hex]),
    )
    .await;
    assert!(!receipt.is_null(), "expected a receipt for a finalized tx");
    assert_eq!(receipt["tx_hash"].as_str().unwrap(), hash_hex);
    assert!(receipt["success"].as_bool().unwrap());

    let counters = rpc_call(&http, &rpc_url, "chronx_getStatusCounters", serde_json::json!([])).await;
    assert!(counters["num_executed_trx"].as_u64().unwrap() >= 1);
}
