//! dispute-core
//! In-memory reference model of an optimistic-rollup dispute-resolution
//! protocol: a tree of state-root assertions with staking and confirmation
//! deadlines, interactive bisection challenges over Merkle history
//! commitments, and block-parameterized path timers gating confirmation.

// Core modules
pub mod chain;
pub mod challenge;
pub mod clock;
pub mod commitments;
pub mod events;
pub mod merkle;
pub mod pathtimer;
pub mod utils;

// Collaborator surfaces
pub mod bindings;
pub mod query;

// Re-export main types for easy access
pub use chain::{
    Address, Assertion, AssertionChain, AssertionEvent, AssertionStatus, BalanceEvent, ChainConfig,
    ChainError, SeqNum, ASSERTION_STAKE, CHALLENGE_VERTEX_STAKE,
};
pub use challenge::{
    Challenge, ChallengeEvent, ChallengeId, ChallengeKind, ChallengeVertex, VertexId, VertexStatus,
};
pub use clock::{ArtificialTimeReference, CountUpTimer, RealTimeReference, TimeReference};
pub use commitments::{HistoryCommitment, StateCommitment};
pub use events::{EventFeed, FeedSubscription};
pub use merkle::{
    bisection_point, generate_prefix_proof, verify_prefix_proof, MerkleError, MerkleExpansion,
    PrefixProof,
};
pub use pathtimer::{EdgeId, EdgeStatus, TimerError, TimerGraph, TrackedEdge};
