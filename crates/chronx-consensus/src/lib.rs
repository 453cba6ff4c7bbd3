//! C4 (PBFT chain) and C5 (replay protection).
//!
//! Neither module evaluates committee thresholds or vote cryptography —
//! spec §3 "Vote... a certified vote set... out of scope here; the core
//! stores and retrieves these by PBFT block hash" — both take an
//! already-certified vote set as given and concern themselves with the
//! append-only chain structure and nonce bookkeeping around it.

mod pbft;
mod replay;

pub use pbft::PbftChain;
pub use replay::{ReplayConfig, ReplayProtector};
