use std::collections::HashMap;
use std::sync::Mutex;

use chronx_core::types::{Address, PublicKey};

use crate::hash::address_from_pubkey;
use crate::recovery::PublicKeyLookup;

/// The account/key registry `chronx-crypto::recovery` leaves as an external
/// collaborator (spec §3: "`sender` is recoverable from the signature",
/// which Dilithium2 cannot do algebraically — see `DilithiumRecovery`).
///
/// A sender's public key enters the registry the first time it is presented
/// alongside one of its transactions (RPC submission or gossip), never
/// invented or guessed. Registration is refused unless the key actually
/// hashes to the claimed address, so a malicious peer cannot poison another
/// sender's entry.
pub struct KeyRegistry {
    keys: Mutex<HashMap<Address, PublicKey>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Register `pubkey` for `address` if it isn't already known. Returns
    /// `false` if `pubkey` does not hash to `address` (refused, not stored).
    pub fn register(&self, address: Address, pubkey: PublicKey) -> bool {
        if address_from_pubkey(&pubkey.0) != address {
            return false;
        }
        self.keys
            .lock()
            .expect("key registry lock poisoned")
            .entry(address)
            .or_insert(pubkey);
        true
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicKeyLookup for KeyRegistry {
    fn public_key_for(&self, sender: Address) -> Option<PublicKey> {
        self.keys.lock().expect("key registry lock poisoned").get(&sender).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;

    #[test]
    fn registers_and_looks_up_a_matching_key() {
        let kp = KeyPair::generate();
        let registry = KeyRegistry::new();
        assert!(registry.register(kp.address, kp.public_key.clone()));
        assert_eq!(registry.public_key_for(kp.address), Some(kp.public_key));
    }

    #[test]
    fn refuses_a_key_that_does_not_hash_to_the_claimed_address() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let registry = KeyRegistry::new();
        assert!(!registry.register(kp.address, other.public_key));
        assert_eq!(registry.public_key_for(kp.address), None);
    }

    #[test]
    fn first_registration_wins() {
        let kp = KeyPair::generate();
        let registry = KeyRegistry::new();
        assert!(registry.register(kp.address, kp.public_key.clone()));
        // A second call with the same (valid) key is a harmless no-op.
        assert!(registry.register(kp.address, kp.public_key.clone()));
        assert_eq!(registry.public_key_for(kp.address), Some(kp.public_key));
    }
}
