//! Stable binary encoding for persisted and hashed types
//!
//! Every byte that reaches the disk store or a hash function goes through
//! this module. The encoding is deterministic: equal values produce equal
//! bytes, which is what makes transaction and block IDs stable.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("value could not be encoded: {0}")]
    Encode(#[source] bincode::Error),
    #[error("corrupt encoding: {0}")]
    CorruptEncoding(#[source] bincode::Error),
}

/// Encode a value to its canonical byte form
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

/// Decode a value from its canonical byte form.
///
/// Truncated or otherwise malformed input is rejected as a whole; no
/// partially populated value is ever returned.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::CorruptEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::TxOutput;

    #[test]
    fn test_round_trip() {
        let output = TxOutput {
            value: 42,
            script_pubkey: vec![1, 2, 3],
        };
        let bytes = encode(&output).unwrap();
        let decoded: TxOutput = decode(&bytes).unwrap();
        assert_eq!(decoded, output);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let output = TxOutput {
            value: 7,
            script_pubkey: vec![9; 20],
        };
        assert_eq!(encode(&output).unwrap(), encode(&output).unwrap());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let output = TxOutput {
            value: 42,
            script_pubkey: vec![1, 2, 3],
        };
        let bytes = encode(&output).unwrap();
        let result: Result<TxOutput, _> = decode(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(CodecError::CorruptEncoding(_))));
    }
}
