//! Merkle Tree Module
//! Keccak-256 Merkle accumulators, inclusion proofs and prefix proofs over
//! sequences of state hashes, the basis of every challenge move
pub mod expansion;
pub mod inclusion;
pub mod prefix;

// Re-export main types
pub use expansion::{MerkleExpansion, MAX_LEVELS};
pub use inclusion::{
    calculate_root_from_proof, generate_inclusion_proof, root_from_leaves, verify_inclusion_proof,
    MAX_PROOF_LEN,
};
pub use prefix::{bisection_point, generate_prefix_proof, verify_prefix_proof, PrefixProof};

/// Merkle layer error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    #[error("no leaves, or leaf index out of range")]
    InvalidLeaves,

    #[error("proof exceeds the maximum node count")]
    ProofTooLong,

    #[error("range is too short to bisect")]
    CannotBisect,

    #[error("proof fails to verify: {0}")]
    ProofFailsToVerify(String),
}
