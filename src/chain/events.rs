//! Assertion-chain and balance event types

use serde::{Deserialize, Serialize};

use crate::chain::assertion::SeqNum;
use crate::chain::ledger::Address;
use crate::challenge::ChallengeId;
use crate::commitments::StateCommitment;

/// Events appended to the assertion feed, one per successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionEvent {
    CreateLeaf {
        seq_num: SeqNum,
        prev_seq_num: SeqNum,
        commitment: StateCommitment,
        staker: Address,
    },
    Confirm {
        seq_num: SeqNum,
    },
    Reject {
        seq_num: SeqNum,
    },
    StartChallenge {
        parent_seq_num: SeqNum,
        challenge: ChallengeId,
    },
}

/// Events appended to the balance feed on every ledger change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceEvent {
    Set {
        account: Address,
        old_balance: u128,
        new_balance: u128,
    },
}
