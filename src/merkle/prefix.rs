//! Prefix Proofs
//! Proofs that one committed sequence of leaves is a prefix of another, plus
//! the power-of-two-aligned bisection point used to narrow disputed ranges

use serde::{Deserialize, Serialize};

use crate::merkle::expansion::MerkleExpansion;
use crate::merkle::MerkleError;
use crate::utils::hash_utils::{hash_pair, keccak256};

/// Proof that the sequence committed by a lower root is a prefix of the
/// sequence committed by a higher root.
///
/// `witnesses` are the roots of the complete subtrees tiling the tail
/// `[lo, hi)`, in the greedy append order the verifier replays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixProof {
    pub pre_expansion: MerkleExpansion,
    pub witnesses: Vec<[u8; 32]>,
}

/// Level of the next complete subtree when `size` leaves are committed and
/// the stream ends at `total`: bounded by the alignment of `size` and by the
/// remaining length.
fn next_subtree_level(size: u64, total: u64) -> u32 {
    debug_assert!(size > 0 && size < total);
    let remaining = total - size;
    let by_alignment = size.trailing_zeros();
    let by_remaining = 63 - remaining.leading_zeros();
    by_alignment.min(by_remaining)
}

/// Root of a perfect subtree over `2^k` rehashed leaves
fn complete_subtree_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    debug_assert!(leaves.len().is_power_of_two());
    let mut level: Vec<[u8; 32]> = leaves.iter().map(|leaf| keccak256(leaf)).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_pair(pair[0], pair[1]))
            .collect();
    }
    level[0]
}

/// Generate a proof that `leaves[..prefix_len]` is a prefix of `leaves`
pub fn generate_prefix_proof(
    prefix_len: u64,
    leaves: &[[u8; 32]],
) -> Result<PrefixProof, MerkleError> {
    let total = leaves.len() as u64;
    if prefix_len == 0 || prefix_len >= total {
        return Err(MerkleError::InvalidLeaves);
    }
    let pre_expansion = MerkleExpansion::from_leaves(&leaves[..prefix_len as usize])?;
    let mut witnesses = Vec::new();
    let mut size = prefix_len;
    while size < total {
        let level = next_subtree_level(size, total);
        let width = 1u64 << level;
        witnesses.push(complete_subtree_root(
            &leaves[size as usize..(size + width) as usize],
        ));
        size += width;
    }
    Ok(PrefixProof {
        pre_expansion,
        witnesses,
    })
}

/// Verify that the tree of `pre_size` leaves rooted at `pre_root` is a prefix
/// of the tree of `post_size` leaves rooted at `post_root`.
pub fn verify_prefix_proof(
    pre_root: [u8; 32],
    pre_size: u64,
    post_root: [u8; 32],
    post_size: u64,
    proof: &PrefixProof,
) -> Result<(), MerkleError> {
    if pre_size == 0 || pre_size >= post_size {
        return Err(MerkleError::ProofFailsToVerify(format!(
            "prefix of {pre_size} leaves cannot extend to {post_size}"
        )));
    }
    if proof.pre_expansion.leaf_count() != pre_size {
        return Err(MerkleError::ProofFailsToVerify(
            "expansion does not commit the claimed prefix length".to_string(),
        ));
    }
    if proof.pre_expansion.root() != pre_root {
        return Err(MerkleError::ProofFailsToVerify(
            "expansion does not root to the prefix commitment".to_string(),
        ));
    }

    // Replay the tail appends and compare the rebuilt root.
    let mut expansion = proof.pre_expansion.clone();
    let mut size = pre_size;
    let mut used = 0usize;
    while size < post_size {
        let witness = proof.witnesses.get(used).ok_or_else(|| {
            MerkleError::ProofFailsToVerify("proof is missing tail subtrees".to_string())
        })?;
        let level = next_subtree_level(size, post_size);
        expansion.append_complete_subtree(level as usize, *witness)?;
        size += 1u64 << level;
        used += 1;
    }
    if used != proof.witnesses.len() {
        return Err(MerkleError::ProofFailsToVerify(
            "proof carries unused tail subtrees".to_string(),
        ));
    }
    if expansion.root() != post_root {
        return Err(MerkleError::ProofFailsToVerify(
            "rebuilt root does not match the higher commitment".to_string(),
        ));
    }
    Ok(())
}

/// The unique power-of-two-aligned height strictly inside `(lo, hi)`.
///
/// Clears every bit of `hi - 1` below the highest bit where it differs from
/// `lo`, yielding the interior height whose trailing segment is the largest
/// power-of-two step fitting the range.
pub fn bisection_point(lo: u64, hi: u64) -> Result<u64, MerkleError> {
    if hi <= lo.saturating_add(1) {
        return Err(MerkleError::CannotBisect);
    }
    let target = hi - 1;
    let differing = target ^ lo;
    let top_bit = 63 - differing.leading_zeros();
    Ok(target & !((1u64 << top_bit) - 1))
}
