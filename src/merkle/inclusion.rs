//! Inclusion Proofs
//! Sibling-path proofs that a leaf belongs to a committed Merkle root, with
//! the zero hash standing in for absent counterparts in partial trees

use crate::merkle::MerkleError;
use crate::utils::hash_utils::{hash_pair, keccak256, ZERO_HASH};

/// Maximum number of sibling nodes accepted in a proof.
pub const MAX_PROOF_LEN: usize = 256;

/// Compute all tree levels bottom-up over the rehashed leaves, padding
/// odd-out nodes with the zero hash.
fn compute_levels(leaves: &[[u8; 32]]) -> Vec<Vec<[u8; 32]>> {
    let mut levels: Vec<Vec<[u8; 32]>> =
        vec![leaves.iter().map(|leaf| keccak256(leaf)).collect()];
    while levels.last().map(Vec::len).unwrap_or(0) > 1 {
        let prev = levels.last().unwrap();
        let mut next = Vec::with_capacity((prev.len() + 1) / 2);
        for pair in prev.chunks(2) {
            let right = if pair.len() == 2 { pair[1] } else { ZERO_HASH };
            next.push(hash_pair(pair[0], right));
        }
        levels.push(next);
    }
    levels
}

/// Root of the padded binary tree over the rehashed leaves
pub fn root_from_leaves(leaves: &[[u8; 32]]) -> Result<[u8; 32], MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::InvalidLeaves);
    }
    Ok(*compute_levels(leaves)
        .last()
        .and_then(|level| level.first())
        .unwrap())
}

/// Generate the sibling path for leaf `index`.
///
/// A single-leaf tree yields an empty proof.
pub fn generate_inclusion_proof(
    leaves: &[[u8; 32]],
    index: u64,
) -> Result<Vec<[u8; 32]>, MerkleError> {
    if leaves.is_empty() || index >= leaves.len() as u64 {
        return Err(MerkleError::InvalidLeaves);
    }
    if leaves.len() == 1 {
        return Ok(Vec::new());
    }
    let levels = compute_levels(leaves);
    let mut proof = Vec::with_capacity(levels.len() - 1);
    for (depth, level) in levels[..levels.len() - 1].iter().enumerate() {
        let position = index >> depth;
        let counterpart = position ^ 1;
        proof.push(
            level
                .get(counterpart as usize)
                .copied()
                .unwrap_or(ZERO_HASH),
        );
    }
    Ok(proof)
}

/// Walk a sibling path from `keccak(leaf)` back to the root, choosing the
/// hashing order from the bits of `index`.
pub fn calculate_root_from_proof(
    proof: &[[u8; 32]],
    index: u64,
    leaf: [u8; 32],
) -> Result<[u8; 32], MerkleError> {
    if proof.len() > MAX_PROOF_LEN {
        return Err(MerkleError::ProofTooLong);
    }
    let mut hash = keccak256(&leaf);
    for (depth, node) in proof.iter().enumerate() {
        let bit = if depth < 64 { (index >> depth) & 1 } else { 0 };
        hash = if bit == 0 {
            hash_pair(hash, *node)
        } else {
            hash_pair(*node, hash)
        };
    }
    Ok(hash)
}

/// Verify a sibling path against an expected root
pub fn verify_inclusion_proof(
    proof: &[[u8; 32]],
    index: u64,
    leaf: [u8; 32],
    root: [u8; 32],
) -> Result<(), MerkleError> {
    let computed = calculate_root_from_proof(proof, index, leaf)?;
    if computed != root {
        return Err(MerkleError::ProofFailsToVerify(format!(
            "inclusion proof for leaf {index} does not reach the committed root"
        )));
    }
    Ok(())
}
