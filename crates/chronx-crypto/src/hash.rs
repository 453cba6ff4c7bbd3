use chronx_core::types::Address;

/// Compute BLAKE3 hash of arbitrary bytes → 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Derive an Address from a raw public key using BLAKE3, keeping the low 20
/// bytes of the digest.
pub fn address_from_pubkey(pubkey_bytes: &[u8]) -> Address {
    let digest = blake3_hash(pubkey_bytes);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::from_bytes(bytes)
}
