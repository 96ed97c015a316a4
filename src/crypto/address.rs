//! Base58Check address encoding and validation
//!
//! An address is `Base58(version || pubkey_hash || checksum)` where the
//! checksum is the first four bytes of the double SHA-256 of
//! `version || pubkey_hash`.

use super::hash::sha256d;
use thiserror::Error;

/// Version byte prepended to the public key hash
pub const ADDRESS_VERSION: u8 = 0x00;

/// Number of checksum bytes appended to an address payload
pub const CHECKSUM_LEN: usize = 4;

/// Length of a public key hash in bytes
pub const PUBKEY_HASH_LEN: usize = 20;

/// Address-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is not valid Base58")]
    InvalidBase58,
    #[error("address payload has invalid length {0}")]
    InvalidLength(usize),
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

/// Encode a 20-byte public key hash as a Base58Check address
pub fn pubkey_hash_to_address(pubkey_hash: &[u8; PUBKEY_HASH_LEN]) -> String {
    let mut payload = Vec::with_capacity(1 + PUBKEY_HASH_LEN + CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pubkey_hash);
    payload.extend_from_slice(&checksum(&payload[..]));
    bs58::encode(payload).into_string()
}

/// Decode an address back to its 20-byte public key hash, verifying the
/// version/checksum envelope
pub fn address_to_pubkey_hash(address: &str) -> Result<[u8; PUBKEY_HASH_LEN], AddressError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)?;

    if decoded.len() != 1 + PUBKEY_HASH_LEN + CHECKSUM_LEN {
        return Err(AddressError::InvalidLength(decoded.len()));
    }

    let (body, actual) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    let expected = checksum(body);
    if !constant_time_eq(actual, &expected) {
        return Err(AddressError::ChecksumMismatch);
    }

    let mut pubkey_hash = [0u8; PUBKEY_HASH_LEN];
    pubkey_hash.copy_from_slice(&body[1..]);
    Ok(pubkey_hash)
}

/// Check whether a string is a well-formed address
pub fn validate_address(address: &str) -> bool {
    address_to_pubkey_hash(address).is_ok()
}

/// First four bytes of the double SHA-256 of the payload
fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = sha256d(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

// Comparison time must not depend on where the first difference is
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash_pubkey;

    #[test]
    fn test_address_round_trip() {
        let pkh = hash_pubkey(b"a public key");
        let address = pubkey_hash_to_address(&pkh);

        assert!(validate_address(&address));
        assert_eq!(address_to_pubkey_hash(&address).unwrap(), pkh);
    }

    #[test]
    fn test_version_zero_addresses_start_with_one() {
        // Base58 maps a leading zero byte to a leading '1'
        let pkh = hash_pubkey(b"another public key");
        let address = pubkey_hash_to_address(&pkh);
        assert!(address.starts_with('1'));
    }

    #[test]
    fn test_leading_zero_preservation() {
        let data = [0u8, 0u8, 1u8, 2u8, 3u8];
        let encoded = bs58::encode(data).into_string();
        assert!(encoded.starts_with("11"));
        assert_eq!(bs58::decode(&encoded).into_vec().unwrap(), data);
    }

    #[test]
    fn test_tampered_address_rejected() {
        let pkh = hash_pubkey(b"a public key");
        let address = pubkey_hash_to_address(&pkh);

        let mut tampered: Vec<char> = address.chars().collect();
        let i = tampered.len() / 2;
        tampered[i] = if tampered[i] == '2' { '3' } else { '2' };
        let tampered: String = tampered.into_iter().collect();

        assert!(!validate_address(&tampered));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert_eq!(
            address_to_pubkey_hash("not base58 0OIl"),
            Err(AddressError::InvalidBase58)
        );
        assert!(matches!(
            address_to_pubkey_hash("1111"),
            Err(AddressError::InvalidLength(_))
        ));
        assert!(!validate_address(""));
    }
}
