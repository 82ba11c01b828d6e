//! Challenge event types

use serde::{Deserialize, Serialize};

use crate::chain::assertion::SeqNum;
use crate::chain::ledger::Address;
use crate::challenge::ChallengeId;
use crate::commitments::HistoryCommitment;

/// Events appended to the challenge feed, one per successful move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeEvent {
    Leaf {
        challenge: ChallengeId,
        vertex_seq_num: u64,
        history: HistoryCommitment,
        winner_if_confirmed: Option<SeqNum>,
        became_ps: bool,
        validator: Address,
    },
    Bisect {
        challenge: ChallengeId,
        from_vertex_seq_num: u64,
        to_vertex_seq_num: u64,
        history: HistoryCommitment,
        became_ps: bool,
        validator: Address,
    },
    Merge {
        challenge: ChallengeId,
        deeper_vertex_seq_num: u64,
        shallower_vertex_seq_num: u64,
        became_ps: bool,
        validator: Address,
    },
    SubChallenge {
        challenge: ChallengeId,
        sub_challenge: ChallengeId,
        on_vertex_seq_num: u64,
    },
    VertexConfirmed {
        challenge: ChallengeId,
        vertex_seq_num: u64,
    },
}
