//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model)
//! - Blocks (with proof of work)
//! - The blockchain engine and its persistent UTXO index
//! - The canonical binary codec

pub mod block;
pub mod blockchain;
pub mod codec;
pub mod pow;
pub mod transaction;
pub mod utxo_set;

pub use block::{Block, BlockHash, BlockHeader};
pub use blockchain::{Blockchain, ChainError};
pub use codec::CodecError;
pub use pow::{ProofOfWork, MAX_NONCE, TARGET_BITS};
pub use transaction::{
    Transaction, TxId, TxInput, TxOutput, TxOutputs, COINBASE_VOUT, REWARD,
};
pub use utxo_set::UtxoSet;
