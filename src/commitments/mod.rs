//! Commitments Module
//! State and history commitments: the claims assertions and challenge
//! vertices are made of, plus their identity hashes

use serde::{Deserialize, Serialize};

use crate::merkle::{
    calculate_root_from_proof, generate_inclusion_proof, root_from_leaves, MerkleError,
};
use crate::utils::hash_utils::{be_word, hash_height_and_root, keccak256};

/// A claim that the machine reaches `state_root` at `height`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateCommitment {
    pub height: u64,
    pub state_root: [u8; 32],
}

impl StateCommitment {
    pub fn new(height: u64, state_root: [u8; 32]) -> Self {
        Self { height, state_root }
    }

    /// Identity hash: `keccak(be(height) ‖ state_root)`
    pub fn hash(&self) -> [u8; 32] {
        hash_height_and_root(self.height, self.state_root)
    }
}

/// A Merkle accumulator commitment over a prefix of state hashes.
///
/// `height` is `len(leaves) - 1`; the first and last leaves travel with the
/// commitment together with inclusion proofs against `merkle`, so a verifier
/// can pin both endpoints without the full leaf stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCommitment {
    pub height: u64,
    pub merkle: [u8; 32],
    pub first_leaf: [u8; 32],
    pub last_leaf: [u8; 32],
    pub first_leaf_proof: Vec<[u8; 32]>,
    pub last_leaf_proof: Vec<[u8; 32]>,
}

impl HistoryCommitment {
    /// Commit to a non-empty sequence of state hashes
    pub fn new(leaves: &[[u8; 32]]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::InvalidLeaves);
        }
        let height = leaves.len() as u64 - 1;
        let merkle = root_from_leaves(leaves)?;
        let first_leaf_proof = generate_inclusion_proof(leaves, 0)?;
        let last_leaf_proof = generate_inclusion_proof(leaves, height)?;
        Ok(Self {
            height,
            merkle,
            first_leaf: leaves[0],
            last_leaf: leaves[leaves.len() - 1],
            first_leaf_proof,
            last_leaf_proof,
        })
    }

    /// Identity hash: `keccak(be(height) ‖ merkle)`
    pub fn hash(&self) -> [u8; 32] {
        hash_height_and_root(self.height, self.merkle)
    }

    /// Check the first-leaf inclusion proof against `merkle`
    pub fn verify_first_leaf(&self) -> Result<(), MerkleError> {
        let computed = calculate_root_from_proof(&self.first_leaf_proof, 0, self.first_leaf)?;
        if computed != self.merkle {
            return Err(MerkleError::ProofFailsToVerify(
                "first leaf is not included in the commitment".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the last-leaf inclusion proof against `merkle`
    pub fn verify_last_leaf(&self) -> Result<(), MerkleError> {
        let computed = calculate_root_from_proof(&self.last_leaf_proof, self.height, self.last_leaf)?;
        if computed != self.merkle {
            return Err(MerkleError::ProofFailsToVerify(
                "last leaf is not included in the commitment".to_string(),
            ));
        }
        Ok(())
    }
}

/// De-duplication identity of an assertion: the state commitment hash bound
/// to the predecessor's sequence number.
pub fn assertion_identity(commitment: &StateCommitment, prev_seq_num: u64) -> [u8; 32] {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&commitment.hash());
    data.extend_from_slice(&be_word(prev_seq_num));
    keccak256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MerkleExpansion;

    fn leaves(n: u64) -> Vec<[u8; 32]> {
        (0..n)
            .map(|i| {
                let mut leaf = [0u8; 32];
                leaf[0] = 0xab;
                leaf[24..].copy_from_slice(&i.to_be_bytes());
                leaf
            })
            .collect()
    }

    #[test]
    fn test_state_commitment_hash_depends_on_both_fields() {
        let a = StateCommitment::new(1, [1u8; 32]);
        let b = StateCommitment::new(2, [1u8; 32]);
        let c = StateCommitment::new(1, [2u8; 32]);
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_history_commitment_matches_expansion_root() {
        for n in 1..=9u64 {
            let input = leaves(n);
            let commitment = HistoryCommitment::new(&input).unwrap();
            assert_eq!(commitment.height, n - 1);
            assert_eq!(
                commitment.merkle,
                MerkleExpansion::from_leaves(&input).unwrap().root()
            );
        }
    }

    #[test]
    fn test_history_commitment_leaf_proofs_verify() {
        let commitment = HistoryCommitment::new(&leaves(7)).unwrap();
        commitment.verify_first_leaf().unwrap();
        commitment.verify_last_leaf().unwrap();
    }

    #[test]
    fn test_tampered_leaf_fails_verification() {
        let mut commitment = HistoryCommitment::new(&leaves(7)).unwrap();
        commitment.last_leaf = [0x13; 32];
        assert!(commitment.verify_last_leaf().is_err());
    }

    #[test]
    fn test_empty_history_rejected() {
        assert_eq!(
            HistoryCommitment::new(&[]).unwrap_err(),
            MerkleError::InvalidLeaves
        );
    }

    #[test]
    fn test_assertion_identity_binds_predecessor() {
        let commitment = StateCommitment::new(5, [9u8; 32]);
        assert_ne!(
            assertion_identity(&commitment, 0),
            assertion_identity(&commitment, 1)
        );
    }
}
