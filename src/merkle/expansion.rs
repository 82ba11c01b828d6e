//! Merkle Expansion Accumulator
//! A sparse vector of level hashes representing the minimal state needed to
//! root a stream of appended leaves. Leaves are rehashed on entry; a complete
//! subtree climbing past an empty level is padded with the zero hash.

use serde::{Deserialize, Serialize};

use crate::merkle::MerkleError;
use crate::utils::hash_utils::{hash_pair, keccak256, ZERO_HASH};

/// Maximum number of levels an expansion may carry (2^64 leaves).
pub const MAX_LEVELS: usize = 64;

/// Accumulator over an append-only stream of leaves.
///
/// Slot `i` holds the root of a complete subtree of `2^i` leaves, or the zero
/// hash when no such subtree is pending at that level. The represented leaf
/// count is the sum of `2^i` over the occupied slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleExpansion {
    levels: Vec<[u8; 32]>,
}

impl MerkleExpansion {
    /// Create an empty expansion (zero leaves, zero root)
    pub fn empty() -> Self {
        Self { levels: Vec::new() }
    }

    /// Build an expansion by appending every leaf in order
    pub fn from_leaves(leaves: &[[u8; 32]]) -> Result<Self, MerkleError> {
        let mut expansion = Self::empty();
        for leaf in leaves {
            expansion.append_leaf(*leaf)?;
        }
        Ok(expansion)
    }

    /// Number of level slots currently allocated
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of leaves committed so far, recovered from slot occupancy
    pub fn leaf_count(&self) -> u64 {
        let mut count = 0u64;
        for (level, slot) in self.levels.iter().enumerate() {
            if *slot != ZERO_HASH {
                count += 1u64 << level;
            }
        }
        count
    }

    /// Append one leaf; the leaf is rehashed before entering the tree
    pub fn append_leaf(&mut self, leaf: [u8; 32]) -> Result<(), MerkleError> {
        self.append_complete_subtree(0, keccak256(&leaf))
    }

    /// Append a complete subtree of `2^level` leaves rooted at `subtree`.
    ///
    /// The current leaf count must be a multiple of `2^level`, i.e. every slot
    /// below `level` must be empty.
    pub fn append_complete_subtree(
        &mut self,
        level: usize,
        subtree: [u8; 32],
    ) -> Result<(), MerkleError> {
        if level >= MAX_LEVELS {
            return Err(MerkleError::ProofTooLong);
        }
        for slot in self.levels.iter().take(level) {
            if *slot != ZERO_HASH {
                return Err(MerkleError::ProofFailsToVerify(
                    "complete subtree is misaligned with the accumulator".to_string(),
                ));
            }
        }
        while self.levels.len() < level {
            self.levels.push(ZERO_HASH);
        }

        // Carry upward like a binary increment.
        let mut carry = subtree;
        let mut at = level;
        loop {
            if at >= MAX_LEVELS {
                return Err(MerkleError::ProofTooLong);
            }
            if at == self.levels.len() {
                self.levels.push(carry);
                return Ok(());
            }
            if self.levels[at] == ZERO_HASH {
                self.levels[at] = carry;
                return Ok(());
            }
            carry = hash_pair(self.levels[at], carry);
            self.levels[at] = ZERO_HASH;
            at += 1;
        }
    }

    /// Root of the committed tree.
    ///
    /// Complete subtrees merge as `keccak(left ‖ right)`; a subtree standing
    /// odd-out at a level is padded as `keccak(node ‖ 0)` on its way up. The
    /// result equals the root of the zero-padded binary tree over the
    /// rehashed leaves. An empty expansion roots to the zero hash.
    pub fn root(&self) -> [u8; 32] {
        let mut accum: Option<([u8; 32], usize)> = None;
        for (level, slot) in self.levels.iter().enumerate() {
            if *slot == ZERO_HASH {
                continue;
            }
            accum = Some(match accum {
                None => (*slot, level),
                Some((mut hash, mut at)) => {
                    while at < level {
                        hash = hash_pair(hash, ZERO_HASH);
                        at += 1;
                    }
                    (hash_pair(*slot, hash), level + 1)
                }
            });
        }
        accum.map(|(hash, _)| hash).unwrap_or(ZERO_HASH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::inclusion::root_from_leaves;

    fn leaves(n: u64) -> Vec<[u8; 32]> {
        (0..n)
            .map(|i| {
                let mut leaf = [0u8; 32];
                leaf[24..].copy_from_slice(&i.to_be_bytes());
                leaf
            })
            .collect()
    }

    #[test]
    fn test_empty_expansion() {
        let expansion = MerkleExpansion::empty();
        assert_eq!(expansion.leaf_count(), 0);
        assert_eq!(expansion.root(), ZERO_HASH);
    }

    #[test]
    fn test_single_leaf_roots_to_rehash() {
        let mut expansion = MerkleExpansion::empty();
        expansion.append_leaf([3u8; 32]).unwrap();
        assert_eq!(expansion.leaf_count(), 1);
        assert_eq!(expansion.root(), keccak256(&[3u8; 32]));
    }

    #[test]
    fn test_two_leaves_pair_directly() {
        let mut expansion = MerkleExpansion::empty();
        expansion.append_leaf([1u8; 32]).unwrap();
        expansion.append_leaf([2u8; 32]).unwrap();
        let expected = hash_pair(keccak256(&[1u8; 32]), keccak256(&[2u8; 32]));
        assert_eq!(expansion.root(), expected);
    }

    #[test]
    fn test_three_leaves_pad_the_tail() {
        let input = leaves(3);
        let expansion = MerkleExpansion::from_leaves(&input).unwrap();
        let left = hash_pair(keccak256(&input[0]), keccak256(&input[1]));
        let right = hash_pair(keccak256(&input[2]), ZERO_HASH);
        assert_eq!(expansion.root(), hash_pair(left, right));
    }

    #[test]
    fn test_expansion_root_matches_padded_tree_for_every_count() {
        for n in 1..=33u64 {
            let input = leaves(n);
            let expansion = MerkleExpansion::from_leaves(&input).unwrap();
            assert_eq!(expansion.leaf_count(), n);
            assert_eq!(
                expansion.root(),
                root_from_leaves(&input).unwrap(),
                "mismatch at {n} leaves"
            );
        }
    }

    #[test]
    fn test_append_complete_subtree_alignment() {
        let mut expansion = MerkleExpansion::from_leaves(&leaves(3)).unwrap();
        // Three leaves committed: appending a 2^1 subtree is misaligned.
        let err = expansion
            .append_complete_subtree(1, [9u8; 32])
            .unwrap_err();
        assert!(matches!(err, MerkleError::ProofFailsToVerify(_)));

        // After a fourth leaf the level-1 slot is free again.
        expansion.append_leaf([9u8; 32]).unwrap();
        expansion.append_complete_subtree(1, [8u8; 32]).unwrap();
        assert_eq!(expansion.leaf_count(), 6);
    }

    #[test]
    fn test_append_rejects_overflowing_level() {
        let mut expansion = MerkleExpansion::empty();
        let err = expansion
            .append_complete_subtree(MAX_LEVELS, [1u8; 32])
            .unwrap_err();
        assert_eq!(err, MerkleError::ProofTooLong);
    }
}
