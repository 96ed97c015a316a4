//! Transaction handling for the blockchain
//!
//! Implements the UTXO transaction model: inputs spending prior outputs,
//! outputs locked to a public key hash, and the coinbase transactions that
//! mint the block reward.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::codec::{self, CodecError};
use crate::crypto::address::pubkey_hash_to_address;
use crate::crypto::hash::sha256;

/// Fixed block reward minted by every coinbase transaction
pub const REWARD: u64 = 100;

/// Sentinel output index carried by the coinbase input
pub const COINBASE_VOUT: i64 = -1;

/// A raw 32-byte transaction identifier.
///
/// This exact byte form is used everywhere a transaction is referenced: in
/// inputs, as chainstate keys, and in lookups. Text encodings exist only at
/// display boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub const ZERO: TxId = TxId([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<TxId> {
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(TxId(bytes))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Transaction input: a reference to an output of a prior transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// ID of the transaction being spent; `None` for coinbase
    pub prev_txid: Option<TxId>,
    /// Index of the spent output, or [`COINBASE_VOUT`]
    pub vout: i64,
    /// Unlocking data; identifies the spender
    pub script_sig: Vec<u8>,
}

/// Transaction output: a value locked to a public key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    /// Locking data; by convention the recipient's 20-byte public key hash
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// Create an output locked to a public key hash
    pub fn locked_to(value: u64, pubkey_hash: &[u8; 20]) -> Self {
        Self {
            value,
            script_pubkey: pubkey_hash.to_vec(),
        }
    }

    /// Check whether this output can be unlocked with the given key hash
    pub fn is_locked_with(&self, pubkey_hash: &[u8]) -> bool {
        self.script_pubkey == pubkey_hash
    }
}

/// The unspent outputs of one transaction, keyed by their original index.
///
/// This is the record stored in the chainstate. Indices are preserved so an
/// entry stays a subsequence of the transaction's output list as spends
/// carve it down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutputs {
    pub outputs: Vec<(u32, TxOutput)>,
}

impl TxOutputs {
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Collect every output of a transaction with its index
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            outputs: tx
                .outputs
                .iter()
                .enumerate()
                .map(|(index, output)| (index as u32, output.clone()))
                .collect(),
        }
    }
}

/// A blockchain transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a transaction and compute its ID
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self, CodecError> {
        let mut tx = Self {
            id: TxId::ZERO,
            inputs,
            outputs,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Create a coinbase transaction minting [`REWARD`] to the recipient.
    ///
    /// The height goes into the default reward note so coinbases of
    /// different blocks never collide on the same transaction ID.
    pub fn new_coinbase(
        recipient: &[u8; 20],
        note: &str,
        height: u64,
    ) -> Result<Self, CodecError> {
        let script_sig = if note.is_empty() {
            format!(
                "Reward to {} at height {}",
                pubkey_hash_to_address(recipient),
                height
            )
            .into_bytes()
        } else {
            note.as_bytes().to_vec()
        };

        let input = TxInput {
            prev_txid: None,
            vout: COINBASE_VOUT,
            script_sig,
        };
        let output = TxOutput::locked_to(REWARD, recipient);

        Self::new(vec![input], vec![output])
    }

    /// A coinbase has exactly one input with no source transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_txid.is_none()
            && self.inputs[0].vout == COINBASE_VOUT
    }

    /// Compute the transaction ID: SHA-256 over the encoding with the ID
    /// field cleared
    pub fn hash(&self) -> Result<TxId, CodecError> {
        let mut stripped = self.clone();
        stripped.id = TxId::ZERO;
        Ok(TxId(sha256(&codec::encode(&stripped)?)))
    }

    /// Encode to the canonical byte form used on disk and on the wire
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    /// Decode from the canonical byte form
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}", self.id)?;
        for (i, input) in self.inputs.iter().enumerate() {
            match input.prev_txid {
                Some(prev) => {
                    writeln!(f, "    input  {}: spends {}:{}", i, prev, input.vout)?;
                }
                None => {
                    writeln!(
                        f,
                        "    input  {}: coinbase \"{}\"",
                        i,
                        String::from_utf8_lossy(&input.script_sig)
                    )?;
                }
            }
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(
                f,
                "    output {}: {} -> {}",
                i,
                output.value,
                hex::encode(&output.script_pubkey)
            )?;
        }
        Ok(())
    }
}
