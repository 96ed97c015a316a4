//! Wallet implementation
//!
//! Key management for the addresses a node controls. Wallets only derive
//! addresses and hold keys; spending goes through the ledger engine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crypto::keys::{KeyError, KeyPair};

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("unknown address {0}")]
    UnknownAddress(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wallet file error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// A single key pair and the address derived from it
pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// The wallet's Base58Check address
    pub fn address(&self) -> String {
        self.key_pair.address()
    }

    /// The 20-byte public key hash the address encodes
    pub fn pubkey_hash(&self) -> [u8; 20] {
        self.key_pair.pubkey_hash()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

// What actually lands in the wallet file: address -> private key hex
type WalletFile = HashMap<String, String>;

/// The wallet collection of one node, persisted beside its database as
/// `wallet_<node_id>.json`
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// The wallet file for a node
    pub fn file_path(data_dir: &Path, node_id: &str) -> PathBuf {
        data_dir.join(format!("wallet_{node_id}.json"))
    }

    /// Load a node's wallets, starting empty if the file does not exist yet
    pub fn open(data_dir: &Path, node_id: &str) -> Result<Self, WalletError> {
        let path = Self::file_path(data_dir, node_id);

        let mut wallets = HashMap::new();
        if path.exists() {
            let data = fs::read_to_string(&path)?;
            let stored: WalletFile = serde_json::from_str(&data)?;
            for (address, private_key_hex) in stored {
                let key_pair = KeyPair::from_private_key_hex(&private_key_hex)?;
                wallets.insert(address, Wallet { key_pair });
            }
        }

        Ok(Self { wallets, path })
    }

    /// Create a new wallet, persist the collection, and return its address
    pub fn create_wallet(&mut self) -> Result<String, WalletError> {
        let wallet = Wallet::new();
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        Ok(address)
    }

    /// All addresses in the collection, sorted for stable listings
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Look up the wallet for an address
    pub fn get(&self, address: &str) -> Result<&Wallet, WalletError> {
        self.wallets
            .get(address)
            .ok_or_else(|| WalletError::UnknownAddress(address.to_string()))
    }

    fn save(&self) -> Result<(), WalletError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored: WalletFile = self
            .wallets
            .iter()
            .map(|(address, wallet)| (address.clone(), wallet.key_pair.private_key_hex()))
            .collect();
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address::validate_address;

    #[test]
    fn test_wallet_address_is_valid() {
        let wallet = Wallet::new();
        assert!(validate_address(&wallet.address()));
    }

    #[test]
    fn test_create_and_reload_wallets() {
        let dir = tempfile::tempdir().unwrap();

        let (a, b) = {
            let mut wallets = Wallets::open(dir.path(), "node1").unwrap();
            let a = wallets.create_wallet().unwrap();
            let b = wallets.create_wallet().unwrap();
            assert_ne!(a, b);
            (a, b)
        };

        let wallets = Wallets::open(dir.path(), "node1").unwrap();
        let mut expected = vec![a.clone(), b.clone()];
        expected.sort();
        assert_eq!(wallets.addresses(), expected);
        assert_eq!(wallets.get(&a).unwrap().address(), a);
    }

    #[test]
    fn test_nodes_have_separate_wallet_files() {
        let dir = tempfile::tempdir().unwrap();

        let mut wallets1 = Wallets::open(dir.path(), "node1").unwrap();
        wallets1.create_wallet().unwrap();

        let wallets2 = Wallets::open(dir.path(), "node2").unwrap();
        assert!(wallets2.addresses().is_empty());
    }

    #[test]
    fn test_unknown_address_lookup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let wallets = Wallets::open(dir.path(), "node1").unwrap();
        assert!(matches!(
            wallets.get("1BoatSLRHtKNngkdXEeobR76b53LETtpyT"),
            Err(WalletError::UnknownAddress(_))
        ));
    }
}
