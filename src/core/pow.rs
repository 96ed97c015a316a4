//! Proof of work over the canonical block preimage
//!
//! The target is `1 << (256 - TARGET_BITS)` interpreted as a big-endian
//! integer; a nonce is valid when the double SHA-256 of the preimage falls
//! strictly below it.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::block::{BlockHash, BlockHeader};
use crate::crypto::hash::sha256d;

/// Difficulty parameter: number of leading zero bits required of a hash
pub const TARGET_BITS: u32 = 24;

/// Upper bound of the nonce search space
pub const MAX_NONCE: u64 = i64::MAX as u64;

// How often the mining loop looks at the cancellation flag
const CANCEL_CHECK_INTERVAL: u64 = 1 << 15;

/// The 32-byte big-endian representation of `1 << (256 - bits)`
pub fn target_bytes(bits: u32) -> [u8; 32] {
    debug_assert!(bits > 0 && bits < 256);
    let mut target = [0u8; 32];
    let shift = 256 - bits as usize;
    target[31 - shift / 8] = 1 << (shift % 8);
    target
}

/// Nonce search and validation over one block header
pub struct ProofOfWork<'a> {
    header: &'a BlockHeader,
    target: [u8; 32],
}

impl<'a> ProofOfWork<'a> {
    pub fn new(header: &'a BlockHeader) -> Self {
        Self {
            header,
            target: target_bytes(header.bits),
        }
    }

    // prev_hash || merkle_root || timestamp || bits || nonce, integers in
    // 64-bit big-endian; the genesis block contributes no prev_hash bytes
    fn preimage(&self, nonce: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(88);
        if let Some(prev) = &self.header.prev_hash {
            data.extend_from_slice(prev.as_bytes());
        }
        data.extend_from_slice(&self.header.merkle_root);
        data.extend_from_slice(&self.header.timestamp.to_be_bytes());
        data.extend_from_slice(&u64::from(self.header.bits).to_be_bytes());
        data.extend_from_slice(&nonce.to_be_bytes());
        data
    }

    /// The block hash this header produces with the given nonce
    pub fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        BlockHash(sha256d(&self.preimage(nonce)))
    }

    fn meets_target(&self, hash: &BlockHash) -> bool {
        hash.as_bytes() < &self.target[..]
    }

    /// Search nonces from zero until the hash falls below the target
    pub fn run(&self) -> (u64, BlockHash) {
        match self.run_cancellable(&AtomicBool::new(false)) {
            Some(found) => found,
            None => unreachable!("mining cancelled without a cancellation source"),
        }
    }

    /// Like [`run`](Self::run), but gives up when `cancel` becomes true.
    /// The flag is only consulted every [`CANCEL_CHECK_INTERVAL`] nonces.
    pub fn run_cancellable(&self, cancel: &AtomicBool) -> Option<(u64, BlockHash)> {
        let mut nonce = 0u64;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return None;
            }

            let hash = self.hash_with_nonce(nonce);
            if self.meets_target(&hash) {
                return Some((nonce, hash));
            }

            // The search space is sized so this cannot trigger at the
            // difficulty this chain runs at
            assert!(nonce < MAX_NONCE, "proof-of-work nonce space exhausted");
            nonce += 1;
        }
    }

    /// Recompute the hash from the stored nonce and confirm it is below the
    /// target
    pub fn validate(&self) -> bool {
        let hash = self.hash_with_nonce(self.header.nonce);
        self.meets_target(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bits: u32) -> BlockHeader {
        BlockHeader {
            timestamp: 1_700_000_000,
            prev_hash: None,
            merkle_root: [0xab; 32],
            bits,
            nonce: 0,
            height: 0,
        }
    }

    #[test]
    fn test_target_for_default_bits() {
        // 1 << 232: the 0x01 sits three bytes down from the top
        let target = target_bytes(TARGET_BITS);
        assert_eq!(target[2], 0x01);
        assert!(target.iter().enumerate().all(|(i, &b)| b == 0 || i == 2));
    }

    #[test]
    fn test_target_within_a_byte() {
        let target = target_bytes(4);
        assert_eq!(target[0], 0x10);
    }

    #[test]
    fn test_mine_and_validate() {
        let mut header = header(8);
        let pow = ProofOfWork::new(&header);
        let (nonce, hash) = pow.run();

        assert_eq!(hash.as_bytes()[0], 0);

        header.nonce = nonce;
        let pow = ProofOfWork::new(&header);
        assert!(pow.validate());
        assert_eq!(pow.hash_with_nonce(nonce), hash);
    }

    #[test]
    fn test_wrong_nonce_fails_validation() {
        let mut header = header(16);
        let pow = ProofOfWork::new(&header);
        let (nonce, _) = pow.run();

        header.nonce = nonce.wrapping_add(1);
        let pow = ProofOfWork::new(&header);
        assert!(!pow.validate());
    }

    #[test]
    fn test_cancellation_stops_the_search() {
        // An impossibly hard target with the flag pre-set returns at once
        let header = header(255);
        let pow = ProofOfWork::new(&header);
        let cancel = AtomicBool::new(true);
        assert!(pow.run_cancellable(&cancel).is_none());
    }
}
