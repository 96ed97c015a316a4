//! Cryptographic hashing utilities for the blockchain
//!
//! Provides the SHA-256 based hashing functions used for block hashes,
//! transaction IDs and address derivation.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block hashes and address checksums
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Computes the 20-byte public key hash: RIPEMD-160(SHA-256(pubkey))
pub fn hash_pubkey(pubkey: &[u8]) -> [u8; 20] {
    let sha = sha256(pubkey);
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha);
    ripemd.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"hello world");
        assert_eq!(
            hex::encode(hash),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256d_differs_from_single() {
        let data = b"hello world";
        assert_ne!(sha256d(data), sha256(data));
        assert_eq!(sha256d(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_hash_pubkey_length() {
        let pkh = hash_pubkey(b"some compressed public key bytes");
        assert_eq!(pkh.len(), 20);
    }
}
