//! Assertion records: state claims chained off a confirmed predecessor

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::ledger::Address;
use crate::challenge::ChallengeId;
use crate::commitments::StateCommitment;

/// Dense index of an assertion within its chain.
pub type SeqNum = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// One node of the assertion tree.
///
/// Absence is meaningful on every optional field: an unset child-creation
/// time is not a zero time, and confirmation logic relies on the difference.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub seq_num: SeqNum,
    pub state_commitment: StateCommitment,
    pub prev: Option<SeqNum>,
    pub status: AssertionStatus,
    pub is_first_child: bool,
    pub first_child_creation_time: Option<Duration>,
    pub second_child_creation_time: Option<Duration>,
    pub challenge: Option<ChallengeId>,
    pub staker: Option<Address>,
}

impl Assertion {
    /// The pre-confirmed root of a fresh chain
    pub(crate) fn genesis() -> Self {
        Self {
            seq_num: 0,
            state_commitment: StateCommitment::default(),
            prev: None,
            status: AssertionStatus::Confirmed,
            is_first_child: false,
            first_child_creation_time: None,
            second_child_creation_time: None,
            challenge: None,
            staker: None,
        }
    }

    pub fn height(&self) -> u64 {
        self.state_commitment.height
    }
}
