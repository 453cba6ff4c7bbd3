use serde::{Deserialize, Serialize};

use crate::types::{Address, Hash, Nonce, Signature, Timestamp};

/// A fully-formed, signed ChronX transaction.
///
/// `hash` is BLAKE3 of the canonical bincode serialization of every field
/// except `hash` and `signature` itself (see [`TransactionBody`]). `sender`
/// is carried explicitly rather than recovered algebraically from the
/// signature — Dilithium2 has no public-key-recovery property the way an
/// ECDSA scheme does — but is authenticated by verifying `signature` against
/// the sender's known public key (see `chronx-crypto::recover_sender`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// BLAKE3 of the canonical body encoding.
    pub hash: Hash,

    /// Per-account monotonically increasing sequence number.
    pub nonce: Nonce,

    /// The account authorizing this transaction.
    pub sender: Address,

    /// Recipient account.
    pub to: Address,

    /// Value transferred, in the ledger's base unit.
    pub value: u128,

    /// Gas limit offered for execution.
    pub gas: u64,

    /// Gas price the sender is willing to pay per unit.
    pub gas_price: u64,

    /// Opaque calldata handed to the external state-transition function.
    pub data: Vec<u8>,

    /// Proof that `sender` authorized this exact body.
    pub signature: Signature,
}

/// The body bytes that are hashed to produce `hash` and covered by
/// `signature`. Excludes `hash` and `signature` themselves.
#[derive(Serialize)]
struct TransactionBody<'a> {
    nonce: Nonce,
    sender: &'a Address,
    to: &'a Address,
    value: u128,
    gas: u64,
    gas_price: u64,
    data: &'a [u8],
}

impl Transaction {
    fn body(&self) -> TransactionBody<'_> {
        TransactionBody {
            nonce: self.nonce,
            sender: &self.sender,
            to: &self.to,
            value: self.value,
            gas: self.gas,
            gas_price: self.gas_price,
            data: &self.data,
        }
    }

    /// Canonical encoding of the body, used both to derive `hash` and as the
    /// bytes covered by `signature`.
    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("transaction body serialization is infallible")
    }

    /// Recompute `hash` from the current field values.
    pub fn compute_hash(&self) -> Hash {
        Hash(*blake3::hash(&self.body_bytes()).as_bytes())
    }

    /// True iff the stored `hash` matches the body's canonical encoding.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }
}
