pub mod dilithium;
pub mod hash;
pub mod keypair;
pub mod recovery;
pub mod registry;

pub use dilithium::{verify_signature, ChronxSigner, SignatureError};
pub use hash::{address_from_pubkey, blake3_hash};
pub use keypair::KeyPair;
pub use recovery::{DilithiumRecovery, PublicKeyLookup, SenderRecovery};
pub use registry::KeyRegistry;
