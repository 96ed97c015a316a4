//! Block implementation for the blockchain
//!
//! A block carries a header with the mining metadata and an ordered list of
//! transactions. Its identity is the proof-of-work hash of the header's
//! canonical preimage.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::codec::{self, CodecError};
use crate::core::pow::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::crypto::merkle::merkle_root;

/// A raw 32-byte block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<BlockHash> {
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(BlockHash(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Block header containing the mined metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Creation time, seconds since the Unix epoch
    pub timestamp: i64,
    /// Hash of the previous block; `None` only for genesis
    pub prev_hash: Option<BlockHash>,
    /// Merkle root of the contained transaction IDs
    pub merkle_root: [u8; 32],
    /// Difficulty target parameter the block was mined against
    pub bits: u32,
    /// Nonce found by the proof-of-work search
    pub nonce: u64,
    /// Distance from genesis
    pub height: u64,
}

/// A block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Proof-of-work hash over the header preimage
    pub hash: BlockHash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create and mine a new block
    pub fn new(
        transactions: Vec<Transaction>,
        prev_hash: Option<BlockHash>,
        height: u64,
        bits: u32,
    ) -> Self {
        let mut header = BlockHeader {
            timestamp: Utc::now().timestamp(),
            prev_hash,
            merkle_root: Self::hash_transactions(&transactions),
            bits,
            nonce: 0,
            height,
        };

        let (nonce, hash) = {
            let pow = ProofOfWork::new(&header);
            pow.run()
        };
        header.nonce = nonce;

        Self {
            header,
            hash,
            transactions,
        }
    }

    /// Mine the genesis block: empty previous hash, height zero, a single
    /// coinbase transaction
    pub fn genesis(coinbase: Transaction, bits: u32) -> Self {
        Self::new(vec![coinbase], None, 0, bits)
    }

    /// Merkle root over the ordered transaction IDs
    pub fn hash_transactions(transactions: &[Transaction]) -> [u8; 32] {
        let ids: Vec<[u8; 32]> = transactions.iter().map(|tx| tx.id.0).collect();
        merkle_root(&ids)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash.is_none()
    }

    /// Check the block's internal consistency: the merkle root matches the
    /// transactions, and the stored hash is the proof-of-work hash of the
    /// header
    pub fn verify(&self) -> bool {
        if Self::hash_transactions(&self.transactions) != self.header.merkle_root {
            return false;
        }

        let pow = ProofOfWork::new(&self.header);
        pow.validate() && pow.hash_with_nonce(self.header.nonce) == self.hash
    }

    /// Encode to the canonical byte form stored in the chain store
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    /// Decode from the canonical byte form
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}
