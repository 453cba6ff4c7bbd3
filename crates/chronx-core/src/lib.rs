pub mod constants;
pub mod dag_block;
pub mod error;
pub mod pbft;
pub mod status;
pub mod transaction;
pub mod types;

pub use constants::*;
pub use dag_block::{DagBlock, DagBlockState};
pub use error::ChronxError;
pub use pbft::{PbftBlock, PbftHead, Vote};
pub use status::{AccountNonceWindow, StatusCounters, TransactionStatus};
pub use transaction::Transaction;
pub use types::{Address, Hash, Nonce, PublicKey, Round, Signature, Step, Timestamp, VdfProof};
