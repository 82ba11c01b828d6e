//! Assertion Chain Module
//! The single logical state machine of the protocol: a tree of state-root
//! assertions with staking, rivalry and confirmation deadlines, the challenge
//! graph layered on top of it, and the event feeds every mutation reports to.
//!
//! All mutations run under one exclusive write transaction; reads run under
//! shared read transactions. Event append happens while the write lock is
//! held, so feed order and commit order coincide.

pub mod assertion;
pub mod events;
pub mod ledger;

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::challenge::{Challenge, ChallengeId, ChallengeVertex, VertexId};
use crate::clock::TimeReference;
use crate::commitments::{assertion_identity, StateCommitment};
use crate::events::EventFeed;
use crate::merkle::MerkleError;

pub use assertion::{Assertion, AssertionStatus, SeqNum};
pub use events::{AssertionEvent, BalanceEvent};
pub use ledger::{Address, BalanceLedger, ASSERTION_STAKE, CHALLENGE_VERTEX_STAKE};

use crate::challenge::events::ChallengeEvent;

/// Error kinds returned by core operations.
///
/// `NotYet` and `PastDeadline` are expected polling outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("wrong chain")]
    WrongChain,

    #[error("invalid operation: {0}")]
    InvalidOp(String),

    #[error("invalid height")]
    InvalidHeight,

    #[error("vertex already exists")]
    VertexAlreadyExists,

    #[error("parent does not exist")]
    ParentDoesNotExist,

    #[error("challenge already exists")]
    ChallengeAlreadyExists,

    #[error("wrong state")]
    WrongState,

    #[error("wrong predecessor state")]
    WrongPredecessorState,

    #[error("not yet")]
    NotYet,

    #[error("past deadline")]
    PastDeadline,

    #[error("no winner yet")]
    NoWinnerYet,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("no last leaf proof")]
    NoLastLeafProof,

    #[error("wrong first leaf")]
    WrongFirstLeaf,

    #[error("wrong last leaf")]
    WrongLastLeaf,

    #[error("proof fails to verify")]
    ProofFailsToVerify,

    #[error("expected a value, found none")]
    OptionEmpty,

    #[error("proof too long")]
    ProofTooLong,

    #[error("invalid leaves")]
    InvalidLeaves,

    #[error("cannot bisect")]
    CannotBisect,
}

impl From<MerkleError> for ChainError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::InvalidLeaves => ChainError::InvalidLeaves,
            MerkleError::ProofTooLong => ChainError::ProofTooLong,
            MerkleError::CannotBisect => ChainError::CannotBisect,
            MerkleError::ProofFailsToVerify(_) => ChainError::ProofFailsToVerify,
        }
    }
}

/// Chain construction parameters
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Window an unrivaled assertion or presumptive successor must survive
    pub challenge_period: Duration,
    /// Per-subscriber event channel capacity
    pub feed_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            challenge_period: Duration::from_secs(100),
            feed_capacity: crate::events::DEFAULT_FEED_CAPACITY,
        }
    }
}

pub(crate) struct ChainFeeds {
    pub(crate) assertions: EventFeed<AssertionEvent>,
    pub(crate) challenges: EventFeed<ChallengeEvent>,
    pub(crate) balances: EventFeed<BalanceEvent>,
}

/// The state behind the chain's readers-writer lock.
///
/// Challenges and vertices are arena-allocated; all graph links are arena
/// keys rather than owning references.
pub struct ChainCore {
    pub(crate) time_ref: Arc<dyn TimeReference>,
    pub(crate) challenge_period: Duration,
    pub(crate) assertions: Vec<Assertion>,
    pub(crate) dedupe: HashSet<[u8; 32]>,
    pub(crate) latest_confirmed: SeqNum,
    pub(crate) balances: BalanceLedger,
    pub(crate) challenges: Vec<Challenge>,
    pub(crate) vertices: Vec<ChallengeVertex>,
    pub(crate) challenges_by_commitment: HashMap<[u8; 32], ChallengeId>,
    pub(crate) vertices_by_history: HashMap<(ChallengeId, [u8; 32]), VertexId>,
}

impl ChainCore {
    /// Sequence number of the latest confirmed assertion
    pub fn latest_confirmed(&self) -> SeqNum {
        self.latest_confirmed
    }

    pub fn num_assertions(&self) -> u64 {
        self.assertions.len() as u64
    }

    /// Bounds-checked assertion access
    pub fn assertion(&self, seq_num: SeqNum) -> Result<&Assertion, ChainError> {
        self.assertions
            .get(seq_num as usize)
            .ok_or(ChainError::ParentDoesNotExist)
    }

    pub fn challenge(&self, id: ChallengeId) -> Result<&Challenge, ChainError> {
        self.challenges.get(id.0).ok_or(ChainError::OptionEmpty)
    }

    pub fn challenge_by_commitment(&self, commitment_hash: &[u8; 32]) -> Option<ChallengeId> {
        self.challenges_by_commitment.get(commitment_hash).copied()
    }

    pub fn vertex(&self, id: VertexId) -> Result<&ChallengeVertex, ChainError> {
        self.vertices.get(id.0).ok_or(ChainError::OptionEmpty)
    }

    pub fn vertex_by_history(
        &self,
        challenge: ChallengeId,
        history_hash: &[u8; 32],
    ) -> Option<VertexId> {
        self.vertices_by_history
            .get(&(challenge, *history_hash))
            .copied()
    }

    pub fn balance(&self, account: Address) -> u128 {
        self.balances.balance(account)
    }

    pub fn challenge_period(&self) -> Duration {
        self.challenge_period
    }

    pub(crate) fn now(&self) -> Duration {
        self.time_ref.now()
    }

    /// All descendants of an assertion, breadth-first.
    ///
    /// Iterative on purpose: deep assertion trees must not recurse.
    pub fn descendants_of(&self, seq_num: SeqNum) -> Result<Vec<SeqNum>, ChainError> {
        self.assertion(seq_num)?;
        let mut children: HashMap<SeqNum, Vec<SeqNum>> = HashMap::new();
        for assertion in &self.assertions {
            if let Some(prev) = assertion.prev {
                children.entry(prev).or_default().push(assertion.seq_num);
            }
        }
        let mut found = Vec::new();
        let mut queue = VecDeque::from([seq_num]);
        while let Some(current) = queue.pop_front() {
            if let Some(direct) = children.get(&current) {
                for child in direct {
                    found.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        Ok(found)
    }

    /// A vertex may take a new successor while it has no presumptive
    /// successor, or while that successor's timer is still inside the
    /// challenge period.
    pub fn eligible_for_new_successor(&self, id: VertexId) -> Result<bool, ChainError> {
        let vertex = self.vertex(id)?;
        Ok(match vertex.presumptive_successor {
            None => true,
            Some(ps) => self.vertex(ps)?.ps_timer.get() <= self.challenge_period,
        })
    }

    /// Whether `id` is its parent's presumptive successor
    pub fn is_presumptive_successor(&self, id: VertexId) -> Result<bool, ChainError> {
        let vertex = self.vertex(id)?;
        Ok(match vertex.prev {
            None => false,
            Some(prev) => self.vertex(prev)?.presumptive_successor == Some(id),
        })
    }

    /// Re-point `parent`'s presumptive successor after inserting `inserted`
    /// beneath it: the lowest-height successor wins, earlier insertions win
    /// ties, and only the winner's timer runs. Returns whether `inserted`
    /// became presumptive.
    pub(crate) fn update_presumptive_successor(
        &mut self,
        parent: VertexId,
        inserted: VertexId,
    ) -> bool {
        let inserted_height = self.vertices[inserted.0].commitment.height;
        if let Some(current) = self.vertices[parent.0].presumptive_successor {
            if inserted_height < self.vertices[current.0].commitment.height {
                self.vertices[current.0].ps_timer.stop();
                self.vertices[parent.0].presumptive_successor = None;
            }
        }
        if self.vertices[parent.0].presumptive_successor.is_none() {
            self.vertices[parent.0].presumptive_successor = Some(inserted);
            self.vertices[inserted.0].ps_timer.start();
        }
        self.vertices[parent.0].presumptive_successor == Some(inserted)
    }
}

/// The assertion chain: one instance per deployment or test, never a process
/// singleton.
pub struct AssertionChain {
    core: RwLock<ChainCore>,
    feeds: ChainFeeds,
    time_ref: Arc<dyn TimeReference>,
    challenge_period: Duration,
}

impl AssertionChain {
    pub fn new(time_ref: Arc<dyn TimeReference>, config: ChainConfig) -> Self {
        let core = ChainCore {
            time_ref: Arc::clone(&time_ref),
            challenge_period: config.challenge_period,
            assertions: vec![Assertion::genesis()],
            dedupe: HashSet::new(),
            latest_confirmed: 0,
            balances: BalanceLedger::default(),
            challenges: Vec::new(),
            vertices: Vec::new(),
            challenges_by_commitment: HashMap::new(),
            vertices_by_history: HashMap::new(),
        };
        Self {
            core: RwLock::new(core),
            feeds: ChainFeeds {
                assertions: EventFeed::with_capacity(config.feed_capacity),
                challenges: EventFeed::with_capacity(config.feed_capacity),
                balances: EventFeed::with_capacity(config.feed_capacity),
            },
            time_ref,
            challenge_period: config.challenge_period,
        }
    }

    pub fn challenge_period(&self) -> Duration {
        self.challenge_period
    }

    pub fn time_reference(&self) -> Arc<dyn TimeReference> {
        Arc::clone(&self.time_ref)
    }

    /// Open a shared read transaction
    pub fn read(&self) -> ChainReadTx<'_> {
        ChainReadTx {
            core: self.core.read(),
        }
    }

    /// Open an exclusive write transaction
    pub fn write(&self) -> ChainWriteTx<'_> {
        ChainWriteTx {
            core: self.core.write(),
            feeds: &self.feeds,
        }
    }

    /// Run `f` under a read transaction
    pub fn call<R>(&self, f: impl FnOnce(&ChainReadTx<'_>) -> R) -> R {
        let tx = self.read();
        f(&tx)
    }

    /// Run `f` under a write transaction
    pub fn tx<R>(&self, f: impl FnOnce(&mut ChainWriteTx<'_>) -> R) -> R {
        let mut tx = self.write();
        f(&mut tx)
    }

    pub fn assertion_events(&self) -> &EventFeed<AssertionEvent> {
        &self.feeds.assertions
    }

    pub fn challenge_events(&self) -> &EventFeed<ChallengeEvent> {
        &self.feeds.challenges
    }

    pub fn balance_events(&self) -> &EventFeed<BalanceEvent> {
        &self.feeds.balances
    }
}

/// Shared read transaction; dereferences to the chain state
pub struct ChainReadTx<'a> {
    core: RwLockReadGuard<'a, ChainCore>,
}

impl Deref for ChainReadTx<'_> {
    type Target = ChainCore;

    fn deref(&self) -> &ChainCore {
        &self.core
    }
}

/// Exclusive write transaction.
///
/// Holds the write lock for its lifetime; all mutating operations live here,
/// and every successful one appends its event before returning.
pub struct ChainWriteTx<'a> {
    pub(crate) core: RwLockWriteGuard<'a, ChainCore>,
    pub(crate) feeds: &'a ChainFeeds,
}

impl Deref for ChainWriteTx<'_> {
    type Target = ChainCore;

    fn deref(&self) -> &ChainCore {
        &self.core
    }
}

impl ChainWriteTx<'_> {
    /// Fund or slash an account out-of-band
    pub fn set_balance(&mut self, account: Address, amount: u128) {
        let (old_balance, new_balance) = self.core.balances.set(account, amount);
        self.feeds.balances.append(BalanceEvent::Set {
            account,
            old_balance,
            new_balance,
        });
    }

    pub(crate) fn credit(&mut self, account: Address, amount: u128) {
        let (old_balance, new_balance) = self.core.balances.credit(account, amount);
        self.feeds.balances.append(BalanceEvent::Set {
            account,
            old_balance,
            new_balance,
        });
    }

    pub(crate) fn debit(&mut self, account: Address, amount: u128) -> Result<(), ChainError> {
        let (old_balance, new_balance) = self.core.balances.debit(account, amount)?;
        self.feeds.balances.append(BalanceEvent::Set {
            account,
            old_balance,
            new_balance,
        });
        Ok(())
    }

    /// Append a new assertion under `prev`.
    ///
    /// Bonds `ASSERTION_STAKE` from `staker`, refunding the predecessor's
    /// previous staker if it differs, and stamps the predecessor's first or
    /// second child-creation time.
    pub fn create_assertion(
        &mut self,
        prev: SeqNum,
        commitment: StateCommitment,
        staker: Address,
    ) -> Result<SeqNum, ChainError> {
        {
            let core = &*self.core;
            let prev_assertion = core.assertion(prev)?;
            if commitment.height <= prev_assertion.height() {
                return Err(ChainError::InvalidHeight);
            }
            if prev_assertion.second_child_creation_time.is_some() {
                return Err(ChainError::InvalidOp(
                    "assertion already has two children".to_string(),
                ));
            }
            if core.dedupe.contains(&assertion_identity(&commitment, prev)) {
                return Err(ChainError::VertexAlreadyExists);
            }
        }

        self.debit(staker, ASSERTION_STAKE)?;

        let refund_to = {
            let prev_assertion = &mut self.core.assertions[prev as usize];
            if prev_assertion.staker.is_some() && prev_assertion.staker != Some(staker) {
                prev_assertion.staker.take()
            } else {
                None
            }
        };
        if let Some(previous) = refund_to {
            self.credit(previous, ASSERTION_STAKE);
        }

        let core = &mut *self.core;
        let now = core.time_ref.now();
        let prev_assertion = &mut core.assertions[prev as usize];
        let is_first_child = prev_assertion.first_child_creation_time.is_none();
        if is_first_child {
            prev_assertion.first_child_creation_time = Some(now);
        } else {
            prev_assertion.second_child_creation_time = Some(now);
        }

        let seq_num = core.assertions.len() as SeqNum;
        core.assertions.push(Assertion {
            seq_num,
            state_commitment: commitment,
            prev: Some(prev),
            status: AssertionStatus::Pending,
            is_first_child,
            first_child_creation_time: None,
            second_child_creation_time: None,
            challenge: None,
            staker: Some(staker),
        });
        core.dedupe.insert(assertion_identity(&commitment, prev));

        log::debug!(
            "created assertion {seq_num} at height {} under {prev}",
            commitment.height
        );
        self.feeds.assertions.append(AssertionEvent::CreateLeaf {
            seq_num,
            prev_seq_num: prev,
            commitment,
            staker,
        });
        Ok(seq_num)
    }

    /// Confirm a pending assertion whose rival window elapsed unchallenged.
    ///
    /// Requires a confirmed predecessor with no second child, strictly past
    /// `first_child_creation_time + challenge_period`; refunds the stake.
    pub fn confirm_no_rival(&mut self, seq_num: SeqNum) -> Result<(), ChainError> {
        let staker = {
            let core = &*self.core;
            let assertion = core.assertion(seq_num)?;
            if assertion.status != AssertionStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.assertion(assertion.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != AssertionStatus::Confirmed {
                return Err(ChainError::WrongPredecessorState);
            }
            if prev.second_child_creation_time.is_some() {
                return Err(ChainError::InvalidOp(
                    "assertion has a rival; confirm by challenge outcome".to_string(),
                ));
            }
            let first_child = prev
                .first_child_creation_time
                .ok_or(ChainError::OptionEmpty)?;
            if core.now() <= first_child + core.challenge_period {
                return Err(ChainError::NotYet);
            }
            core.assertions[seq_num as usize].staker
        };

        self.apply_confirmation(seq_num, staker);
        Ok(())
    }

    /// Confirm a pending assertion that won its predecessor's challenge
    pub fn confirm_for_win(&mut self, seq_num: SeqNum) -> Result<(), ChainError> {
        let staker = {
            let core = &*self.core;
            let assertion = core.assertion(seq_num)?;
            if assertion.status != AssertionStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.assertion(assertion.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != AssertionStatus::Confirmed {
                return Err(ChainError::WrongPredecessorState);
            }
            let challenge = prev.challenge.ok_or(ChainError::WrongPredecessorState)?;
            let winner = core
                .challenge(challenge)?
                .winner_assertion
                .ok_or(ChainError::NoWinnerYet)?;
            if winner != seq_num {
                return Err(ChainError::InvalidOp(
                    "challenge was won by a rival".to_string(),
                ));
            }
            core.assertions[seq_num as usize].staker
        };

        self.apply_confirmation(seq_num, staker);
        Ok(())
    }

    fn apply_confirmation(&mut self, seq_num: SeqNum, staker: Option<Address>) {
        {
            let core = &mut *self.core;
            debug_assert!(seq_num >= core.latest_confirmed);
            core.assertions[seq_num as usize].status = AssertionStatus::Confirmed;
            core.assertions[seq_num as usize].staker = None;
            core.latest_confirmed = seq_num;
        }
        if let Some(staker) = staker {
            self.credit(staker, ASSERTION_STAKE);
        }
        log::info!("confirmed assertion {seq_num}");
        self.feeds
            .assertions
            .append(AssertionEvent::Confirm { seq_num });
    }

    /// Reject a pending assertion whose predecessor was rejected
    pub fn reject_for_prev(&mut self, seq_num: SeqNum) -> Result<(), ChainError> {
        {
            let core = &*self.core;
            let assertion = core.assertion(seq_num)?;
            if assertion.status != AssertionStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.assertion(assertion.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != AssertionStatus::Rejected {
                return Err(ChainError::WrongPredecessorState);
            }
        }
        self.apply_rejection(seq_num);
        Ok(())
    }

    /// Reject a pending assertion that lost its predecessor's challenge
    pub fn reject_for_loss(&mut self, seq_num: SeqNum) -> Result<(), ChainError> {
        {
            let core = &*self.core;
            let assertion = core.assertion(seq_num)?;
            if assertion.status != AssertionStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.assertion(assertion.prev.ok_or(ChainError::OptionEmpty)?)?;
            let challenge = prev.challenge.ok_or(ChainError::WrongPredecessorState)?;
            let winner = core
                .challenge(challenge)?
                .winner_assertion
                .ok_or(ChainError::NoWinnerYet)?;
            if winner == seq_num {
                return Err(ChainError::InvalidOp(
                    "assertion won its challenge".to_string(),
                ));
            }
        }
        self.apply_rejection(seq_num);
        Ok(())
    }

    fn apply_rejection(&mut self, seq_num: SeqNum) {
        self.core.assertions[seq_num as usize].status = AssertionStatus::Rejected;
        log::info!("rejected assertion {seq_num}");
        self.feeds
            .assertions
            .append(AssertionEvent::Reject { seq_num });
    }
}
