//! C2: the transaction admission queue.
//!
//! Moves transactions from an untrusted intake buffer through signature
//! verification into a verified pool available for block proposal and
//! execution. Grounded in `examples/original_source/transaction_queue.hpp`:
//! a shared-mutex-guarded intake list plus an unverified/verified split,
//! condvar-gated `pop_unverified`, ported from
//! `boost::shared_mutex`/`boost::condition_variable_any` into
//! `std::sync::{RwLock, Condvar}`.

mod pool;
mod worker;

pub use pool::{PoolSizes, TxPool, TxPoolConfig};
pub use worker::spawn_verifiers;
