//! C3: the in-memory DAG index over persisted blocks.
//!
//! Generalizes the teacher's single-parent "Vertex"/tangle model into the
//! block-DAG model of spec §3: blocks with a `pivot` plus non-pivot `tips`,
//! a level index, a pivot chain selected by subtree weight, and anchor
//! selection by finalization horizon. Grounded in
//! `examples/original_source/src/db_storage.cpp`'s `getBlocksByLevel` /
//! `getDagBlocksAtLevel` / `getAllDagBlockState` for the query surface.

mod index;
mod ordering;
mod store;

pub use index::DagIndexSnapshot;
pub use ordering::anchor_for_period;
pub use store::{DagStore, DagStoreConfig};
