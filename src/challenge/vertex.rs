//! Challenge vertices: nodes of a bisection tree

use serde::{Deserialize, Serialize};

use crate::chain::assertion::SeqNum;
use crate::chain::ledger::Address;
use crate::challenge::ChallengeId;
use crate::clock::CountUpTimer;
use crate::commitments::HistoryCommitment;

/// Arena key of a vertex; graph links are keys, never owning references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexStatus {
    Pending,
    Confirmed,
}

/// One node in a challenge's bisection tree, carrying a history commitment
/// over a sub-range of execution.
///
/// `winner_if_confirmed` is set on the leaves of succession challenges and
/// names the assertion that wins if this leaf confirms;
/// `winner_vertex_if_confirmed` plays the same role for sub-challenge leaves,
/// naming a vertex of the parent challenge.
#[derive(Debug)]
pub struct ChallengeVertex {
    pub id: VertexId,
    pub challenge: ChallengeId,
    pub seq_num: u64,
    pub is_leaf: bool,
    pub status: VertexStatus,
    pub commitment: HistoryCommitment,
    pub prev: Option<VertexId>,
    pub presumptive_successor: Option<VertexId>,
    pub ps_timer: CountUpTimer,
    pub sub_challenge: Option<ChallengeId>,
    pub winner_if_confirmed: Option<SeqNum>,
    pub winner_vertex_if_confirmed: Option<VertexId>,
    pub mini_staker: Option<Address>,
}

impl ChallengeVertex {
    pub fn height(&self) -> u64 {
        self.commitment.height
    }

    pub fn history_hash(&self) -> [u8; 32] {
        self.commitment.hash()
    }
}
