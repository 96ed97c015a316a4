//! ECDSA key management for wallets
//!
//! Key pair generation, signing, and verification using the secp256k1
//! elliptic curve. The ledger core does not verify signatures yet; these
//! keys exist so wallets can derive addresses and so a real signature
//! regime can be introduced without changing the key model.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::address::pubkey_hash_to_address;
use super::hash::{hash_pubkey, sha256};

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// The 20-byte hash of the compressed public key
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash_pubkey(&self.public_key.serialize())
    }

    /// The Base58Check address for this key pair
    pub fn address(&self) -> String {
        pubkey_hash_to_address(&self.pubkey_hash())
    }

    /// Sign a 32-byte message hash with the private key
    pub fn sign(&self, message_hash: &[u8]) -> Result<Vec<u8>, KeyError> {
        let secp = Secp256k1::new();
        let hash = digest32(message_hash);
        let message = Message::from_digest_slice(&hash)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, message_hash: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let secp = Secp256k1::new();
        let hash = digest32(message_hash);
        let message = Message::from_digest_slice(&hash)?;
        let sig = secp256k1::ecdsa::Signature::from_compact(signature)
            .map_err(|_| KeyError::InvalidSignature)?;
        Ok(secp.verify_ecdsa(&message, &sig, &self.public_key).is_ok())
    }
}

// secp256k1 messages must be exactly 32 bytes
fn digest32(message_hash: &[u8]) -> [u8; 32] {
    if message_hash.len() == 32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(message_hash);
        out
    } else {
        sha256(message_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address::validate_address;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert!(!kp.private_key_hex().is_empty());
        assert!(validate_address(&kp.address()));
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let hash = sha256(b"Hello, blockchain!");

        let signature = kp.sign(&hash).unwrap();
        assert!(kp.verify(&hash, &signature).unwrap());

        let other = KeyPair::generate();
        assert!(!other.verify(&hash, &signature).unwrap());
    }
}
