use std::sync::Arc;

use chronx_core::{Address, ChronxError, PublicKey, Transaction};

/// The narrow capability C2's verifier workers are constructed with (see
/// spec §9, "replace the back-reference with a narrow capability
/// interface"). Implementations resolve the public key a transaction's
/// claimed `sender` should have signed with, however they choose to —
/// an account/key registry is itself an external collaborator.
pub trait PublicKeyLookup: Send + Sync {
    fn public_key_for(&self, sender: Address) -> Option<PublicKey>;
}

impl<L: PublicKeyLookup + ?Sized> PublicKeyLookup for Arc<L> {
    fn public_key_for(&self, sender: Address) -> Option<PublicKey> {
        (**self).public_key_for(sender)
    }
}

/// Verifies that `tx.signature` authenticates `tx.sender` over the
/// transaction's canonical body bytes.
///
/// Dilithium2 has no algebraic public-key-recovery property (unlike ECDSA),
/// so "sender recovery" here means: look up the public key the claimed
/// sender is supposed to control, verify the signature against it, and
/// confirm the key actually hashes to that address. Both checks must pass.
pub trait SenderRecovery: Send + Sync {
    fn recover_sender(&self, tx: &Transaction) -> Result<Address, ChronxError>;
}

pub struct DilithiumRecovery<L: PublicKeyLookup> {
    lookup: L,
}

impl<L: PublicKeyLookup> DilithiumRecovery<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }
}

impl<L: PublicKeyLookup> SenderRecovery for DilithiumRecovery<L> {
    fn recover_sender(&self, tx: &Transaction) -> Result<Address, ChronxError> {
        let public_key = self
            .lookup
            .public_key_for(tx.sender)
            .ok_or(ChronxError::SignatureInvalid)?;

        if crate::hash::address_from_pubkey(&public_key.0) != tx.sender {
            return Err(ChronxError::SignatureInvalid);
        }

        crate::dilithium::verify_signature(&public_key, &tx.body_bytes(), &tx.signature)
            .map_err(|_| ChronxError::SignatureInvalid)?;

        Ok(tx.sender)
    }
}
