//! chronx-p2p
//!
//! libp2p networking layer for ChronX nodes.
//!
//! GossipSub broadcasts new transactions and DAG/PBFT blocks to all
//! connected peers. Kademlia DHT handles peer discovery and bootstrap.
//! Identify and Ping maintain connection metadata and liveness.
//!
//! Committee vote aggregation and the wider PBFT network protocol are out
//! of scope (spec §1/§2); this crate only carries the gossip payloads and
//! the intake points (`intake::handle_dag_block`/`handle_pbft_block`) that
//! feed C3/C4 once a block has arrived.

pub mod config;
pub mod intake;
pub mod message;
pub mod network;

pub use config::P2pConfig;
pub use message::P2pMessage;
pub use network::{P2pHandle, P2pNetwork};
