//! Cryptographic utilities for the blockchain
//!
//! This module provides:
//! - SHA-256 / double SHA-256 hashing and public key hashing
//! - Base58Check address encoding and validation
//! - ECDSA key management (secp256k1)
//! - Merkle root calculation

pub mod address;
pub mod hash;
pub mod keys;
pub mod merkle;

pub use address::{
    address_to_pubkey_hash, pubkey_hash_to_address, validate_address, AddressError,
    ADDRESS_VERSION, CHECKSUM_LEN, PUBKEY_HASH_LEN,
};
pub use hash::{hash_pubkey, sha256, sha256d};
pub use keys::{KeyError, KeyPair};
pub use merkle::merkle_root;
