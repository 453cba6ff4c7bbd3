//! C6: the executor.
//!
//! Consumes finalized PBFT blocks in period order, deterministically
//! flattens their anchor's DAG closure into a transaction sequence, filters
//! replays, invokes the external state-transition function, persists the
//! result atomically, and notifies subscribers. Grounded in
//! `examples/original_source/src/node/executor.hpp`'s single worker thread
//! plus condition-variable-fed loop.

mod executor;
mod transition;
mod worker;

pub use executor::Executor;
pub use transition::{
    ExecutionOutcome, ExecutionSubscriber, FinalizedPeriod, NullSubscriber, StateTransition,
    TransactionReceipt,
};
pub use worker::spawn_executor;
