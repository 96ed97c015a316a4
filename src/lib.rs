//! Mini-Coin: a didactic single-currency UTXO ledger in Rust
//!
//! This crate provides a complete proof-of-work blockchain featuring:
//! - UTXO-based transactions with a persistent chainstate index
//! - Proof of Work mining with a cancellable nonce search
//! - Merkle tree transaction commitment
//! - An embedded chain store (blocks + chainstate) with atomic updates
//! - Base58Check addresses and secp256k1 wallets
//!
//! # Example
//!
//! ```no_run
//! use mini_coin::core::Blockchain;
//! use mini_coin::wallet::Wallets;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data_dir = Path::new(".minicoin_data");
//!
//! // Create a wallet and a chain paying it the genesis reward
//! let mut wallets = Wallets::open(data_dir, "3000")?;
//! let alice = wallets.create_wallet()?;
//! let chain = Blockchain::create(data_dir, "3000", &alice)?;
//!
//! println!("Balance: {} coins", chain.balance(&alice)?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use crate::core::{
    Block, BlockHash, BlockHeader, Blockchain, ChainError, ProofOfWork, Transaction, TxId,
    TxInput, TxOutput, TxOutputs, UtxoSet, REWARD, TARGET_BITS,
};
pub use crate::crypto::KeyPair;
pub use crate::storage::{ChainStore, StoreError};
pub use crate::wallet::{Wallet, Wallets};
