//! C1: the durable, column-partitioned key-value store.
//!
//! See `Batch`'s doc comment for the cross-column atomicity caveat, and
//! `Store`'s for the on-disk layout (live tree, opaque state-db blob,
//! snapshots, rebuild backups).

mod batch;
mod columns;
mod store;

pub use batch::Batch;
pub use columns::{level_index_key, level_prefix, replay_window_key, replay_window_prefix, status_keys, Column};
pub use store::{Store, StoreConfig};
