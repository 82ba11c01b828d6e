//! Hash Utilities
//! Keccak-256 helpers and the 32-byte big-endian encodings used by every
//! identity hash in the protocol

use sha3::{Digest, Keccak256};

/// The all-zero hash, used for empty accumulator slots and padding.
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// Hash a byte slice using Keccak-256
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash two 32-byte nodes together, left before right
pub fn hash_pair(left: [u8; 32], right: [u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Encode a u64 as a 32-byte big-endian word
pub fn be_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Hash a height word together with a 32-byte root
pub fn hash_height_and_root(height: u64, root: [u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(be_word(height));
    hasher.update(root);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256 of the empty string
        let empty = keccak256(&[]);
        assert_eq!(
            hex::encode(empty),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_pair_matches_concatenation() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        let mut data = Vec::new();
        data.extend_from_slice(&left);
        data.extend_from_slice(&right);
        assert_eq!(hash_pair(left, right), keccak256(&data));
        assert_ne!(hash_pair(left, right), hash_pair(right, left));
    }

    #[test]
    fn test_be_word_layout() {
        let word = be_word(0x0102030405060708);
        assert_eq!(&word[..24], &[0u8; 24]);
        assert_eq!(&word[24..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_hash_height_and_root_matches_manual_encoding() {
        let root = [7u8; 32];
        let mut data = Vec::new();
        data.extend_from_slice(&be_word(42));
        data.extend_from_slice(&root);
        assert_eq!(hash_height_and_root(42, root), keccak256(&data));
    }
}
