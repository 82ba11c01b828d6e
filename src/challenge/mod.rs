//! Challenge Module
//! Interactive bisection challenges over rival assertions: succession
//! challenges, leaf claims, bisection and merging of history commitments,
//! sub-challenges, and timer- or deadline-based vertex confirmation.
//!
//! All moves are methods on the chain's write transaction; the challenge and
//! vertex arenas live inside the chain state.

pub mod events;
pub mod vertex;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::assertion::{AssertionStatus, SeqNum};
use crate::chain::ledger::{Address, CHALLENGE_VERTEX_STAKE};
use crate::chain::{AssertionEvent, ChainError, ChainWriteTx};
use crate::clock::CountUpTimer;
use crate::commitments::HistoryCommitment;
use crate::merkle::{bisection_point, verify_prefix_proof, PrefixProof};

pub use events::ChallengeEvent;
pub use vertex::{ChallengeVertex, VertexId, VertexStatus};

/// Arena key of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub usize);

/// Granularity of the disputed execution trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    Block,
    BigStep,
    SmallStep,
}

impl ChallengeKind {
    /// The next finer granularity, if any
    pub fn sub_challenge_kind(self) -> Option<Self> {
        match self {
            ChallengeKind::Block => Some(ChallengeKind::BigStep),
            ChallengeKind::BigStep => Some(ChallengeKind::SmallStep),
            ChallengeKind::SmallStep => None,
        }
    }
}

/// A dispute between the rival successors of an assertion (or, for
/// sub-challenges, the rival successors of a vertex recorded in
/// `claim_vertex`).
#[derive(Debug)]
pub struct Challenge {
    pub id: ChallengeId,
    pub kind: ChallengeKind,
    pub root_assertion: SeqNum,
    pub root_vertex: VertexId,
    pub creation_time: Duration,
    pub included_histories: HashSet<[u8; 32]>,
    pub winner_vertex: Option<VertexId>,
    pub winner_assertion: Option<SeqNum>,
    pub leaf_count: u64,
    pub(crate) next_vertex_seq_num: u64,
    pub claim_vertex: Option<VertexId>,
}

impl Challenge {
    /// A challenge is complete once a winner is decided
    pub fn is_complete(&self) -> bool {
        self.winner_vertex.is_some() || self.winner_assertion.is_some()
    }
}

impl ChainWriteTx<'_> {
    /// Open a succession challenge on an assertion with two children.
    ///
    /// The root vertex sits at height 0 with a zero merkle, pre-confirmed,
    /// its timer attached to the chain's time reference.
    pub fn create_succession_challenge(&mut self, on: SeqNum) -> Result<ChallengeId, ChainError> {
        let commitment_hash = {
            let core = &*self.core;
            let assertion = core.assertion(on)?;
            if assertion.status == AssertionStatus::Rejected {
                return Err(ChainError::WrongState);
            }
            if assertion.second_child_creation_time.is_none() {
                return Err(ChainError::InvalidOp(
                    "assertion has no rival to dispute".to_string(),
                ));
            }
            if assertion.challenge.is_some() {
                return Err(ChainError::ChallengeAlreadyExists);
            }
            let commitment_hash = assertion.state_commitment.hash();
            if core.challenges_by_commitment.contains_key(&commitment_hash) {
                return Err(ChainError::ChallengeAlreadyExists);
            }
            commitment_hash
        };

        let core = &mut *self.core;
        let now = core.time_ref.now();
        let challenge_id = ChallengeId(core.challenges.len());
        let root_id = VertexId(core.vertices.len());
        let mut ps_timer = CountUpTimer::new(Arc::clone(&core.time_ref));
        ps_timer.start();
        let root_commitment = HistoryCommitment::default();
        let root_hash = root_commitment.hash();
        core.vertices.push(ChallengeVertex {
            id: root_id,
            challenge: challenge_id,
            seq_num: 0,
            is_leaf: false,
            status: VertexStatus::Confirmed,
            commitment: root_commitment,
            prev: None,
            presumptive_successor: None,
            ps_timer,
            sub_challenge: None,
            winner_if_confirmed: None,
            winner_vertex_if_confirmed: None,
            mini_staker: None,
        });
        core.challenges.push(Challenge {
            id: challenge_id,
            kind: ChallengeKind::Block,
            root_assertion: on,
            root_vertex: root_id,
            creation_time: now,
            included_histories: HashSet::new(),
            winner_vertex: None,
            winner_assertion: None,
            leaf_count: 0,
            next_vertex_seq_num: 1,
            claim_vertex: None,
        });
        core.assertions[on as usize].challenge = Some(challenge_id);
        core.challenges_by_commitment
            .insert(commitment_hash, challenge_id);
        core.vertices_by_history
            .insert((challenge_id, root_hash), root_id);

        log::info!("opened succession challenge on assertion {on}");
        self.feeds.assertions.append(AssertionEvent::StartChallenge {
            parent_seq_num: on,
            challenge: challenge_id,
        });
        Ok(challenge_id)
    }

    /// Claim a full history for one of the disputed assertion's children.
    ///
    /// Bonds `CHALLENGE_VERTEX_STAKE`. A first-child leaf starts its timer
    /// preloaded with the head start its assertion enjoyed before the rival
    /// appeared.
    pub fn add_leaf(
        &mut self,
        challenge: ChallengeId,
        assertion: SeqNum,
        history: HistoryCommitment,
        validator: Address,
    ) -> Result<VertexId, ChainError> {
        let (root_vertex, timer_preload) = {
            let core = &*self.core;
            let chal = core.challenge(challenge)?;
            if chal.claim_vertex.is_some() {
                return Err(ChainError::InvalidOp(
                    "sub-challenge leaves are added with add_sub_challenge_leaf".to_string(),
                ));
            }
            let leaf_assertion = core.assertion(assertion)?;
            if leaf_assertion.prev != Some(chal.root_assertion) {
                return Err(ChainError::InvalidOp(
                    "assertion does not fork from the disputed assertion".to_string(),
                ));
            }
            if chal.is_complete() {
                return Err(ChainError::WrongState);
            }
            if !core.eligible_for_new_successor(chal.root_vertex)? {
                return Err(ChainError::PastDeadline);
            }
            if chal.included_histories.contains(&history.hash()) {
                return Err(ChainError::VertexAlreadyExists);
            }
            if core.balance(validator) < CHALLENGE_VERTEX_STAKE {
                return Err(ChainError::InsufficientBalance);
            }
            if history.last_leaf_proof.is_empty() {
                return Err(ChainError::NoLastLeafProof);
            }
            if let Err(err) = history.verify_last_leaf() {
                log::warn!(
                    "rejecting challenge leaf {} with a bad last-leaf proof: {err}",
                    hex::encode(history.hash())
                );
                return Err(ChainError::ProofFailsToVerify);
            }
            let prev_assertion = core.assertion(chal.root_assertion)?;
            if prev_assertion.height() > 0
                && history.first_leaf != prev_assertion.state_commitment.state_root
            {
                log::warn!("rejecting challenge leaf that does not start at the disputed state");
                return Err(ChainError::WrongFirstLeaf);
            }
            if history.last_leaf != leaf_assertion.state_commitment.state_root {
                log::warn!("rejecting challenge leaf that does not end at its assertion's state");
                return Err(ChainError::WrongLastLeaf);
            }
            if history.height != leaf_assertion.height() - prev_assertion.height() {
                return Err(ChainError::InvalidHeight);
            }
            let timer_preload = if leaf_assertion.is_first_child {
                let first = prev_assertion
                    .first_child_creation_time
                    .ok_or(ChainError::OptionEmpty)?;
                let second = prev_assertion
                    .second_child_creation_time
                    .ok_or(ChainError::OptionEmpty)?;
                Some(second.saturating_sub(first))
            } else {
                None
            };
            (chal.root_vertex, timer_preload)
        };

        self.debit(validator, CHALLENGE_VERTEX_STAKE)?;

        let core = &mut *self.core;
        let history_hash = history.hash();
        let vertex_id = VertexId(core.vertices.len());
        let mut ps_timer = CountUpTimer::new(Arc::clone(&core.time_ref));
        if let Some(preload) = timer_preload {
            ps_timer.set(preload);
        }
        let seq_num = core.challenges[challenge.0].next_vertex_seq_num;
        core.challenges[challenge.0].next_vertex_seq_num += 1;
        core.vertices.push(ChallengeVertex {
            id: vertex_id,
            challenge,
            seq_num,
            is_leaf: true,
            status: VertexStatus::Pending,
            commitment: history.clone(),
            prev: Some(root_vertex),
            presumptive_successor: None,
            ps_timer,
            sub_challenge: None,
            winner_if_confirmed: Some(assertion),
            winner_vertex_if_confirmed: None,
            mini_staker: Some(validator),
        });
        let became_ps = core.update_presumptive_successor(root_vertex, vertex_id);
        core.challenges[challenge.0].leaf_count += 1;
        core.challenges[challenge.0]
            .included_histories
            .insert(history_hash);
        core.vertices_by_history
            .insert((challenge, history_hash), vertex_id);

        self.feeds.challenges.append(ChallengeEvent::Leaf {
            challenge,
            vertex_seq_num: seq_num,
            history,
            winner_if_confirmed: Some(assertion),
            became_ps,
            validator,
        });
        Ok(vertex_id)
    }

    /// Narrow a contested vertex to the bisection point of its range.
    ///
    /// Only non-presumptive vertices bisect. The new midpoint inherits a
    /// stopped clone of the mover's timer and takes the mover as its child.
    pub fn bisect(
        &mut self,
        vertex: VertexId,
        history: HistoryCommitment,
        proof: PrefixProof,
        validator: Address,
    ) -> Result<VertexId, ChainError> {
        let (challenge, prev) = {
            let core = &*self.core;
            let v = core.vertex(vertex)?;
            if v.status != VertexStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let chal = core.challenge(v.challenge)?;
            if chal.is_complete() {
                return Err(ChainError::WrongState);
            }
            let prev = v.prev.ok_or_else(|| {
                ChainError::InvalidOp("the root vertex cannot bisect".to_string())
            })?;
            if core.vertex(prev)?.presumptive_successor == Some(vertex) {
                return Err(ChainError::WrongState);
            }
            if !core.eligible_for_new_successor(prev)? {
                return Err(ChainError::PastDeadline);
            }
            if chal.included_histories.contains(&history.hash()) {
                return Err(ChainError::VertexAlreadyExists);
            }
            let expected = bisection_point(core.vertex(prev)?.height(), v.height())?;
            if history.height != expected {
                return Err(ChainError::InvalidHeight);
            }
            if let Err(err) = verify_prefix_proof(
                history.merkle,
                history.height + 1,
                v.commitment.merkle,
                v.height() + 1,
                &proof,
            ) {
                log::warn!(
                    "rejecting bisection to {} with an invalid prefix proof: {err}",
                    hex::encode(history.hash())
                );
                return Err(ChainError::ProofFailsToVerify);
            }
            (v.challenge, prev)
        };

        let core = &mut *self.core;
        core.vertices[vertex.0].ps_timer.stop();
        let mid_timer = core.vertices[vertex.0].ps_timer.clone();
        let history_hash = history.hash();
        let mid = VertexId(core.vertices.len());
        let seq_num = core.challenges[challenge.0].next_vertex_seq_num;
        core.challenges[challenge.0].next_vertex_seq_num += 1;
        core.vertices.push(ChallengeVertex {
            id: mid,
            challenge,
            seq_num,
            is_leaf: false,
            status: VertexStatus::Pending,
            commitment: history.clone(),
            prev: Some(prev),
            presumptive_successor: None,
            ps_timer: mid_timer,
            sub_challenge: None,
            winner_if_confirmed: None,
            winner_vertex_if_confirmed: None,
            mini_staker: None,
        });
        core.vertices[vertex.0].prev = Some(mid);
        let became_ps = core.update_presumptive_successor(prev, mid);
        core.update_presumptive_successor(mid, vertex);
        core.challenges[challenge.0]
            .included_histories
            .insert(history_hash);
        core.vertices_by_history
            .insert((challenge, history_hash), mid);

        let from_seq_num = core.vertices[vertex.0].seq_num;
        self.feeds.challenges.append(ChallengeEvent::Bisect {
            challenge,
            from_vertex_seq_num: from_seq_num,
            to_vertex_seq_num: seq_num,
            history,
            became_ps,
            validator,
        });
        Ok(mid)
    }

    /// Fold a vertex onto an existing midpoint committing the same prefix.
    ///
    /// The target absorbs the mover's accumulated timer and the mover
    /// reparents beneath it.
    pub fn merge(
        &mut self,
        vertex: VertexId,
        merging_to: VertexId,
        proof: PrefixProof,
        validator: Address,
    ) -> Result<(), ChainError> {
        let (challenge, prev) = {
            let core = &*self.core;
            let v = core.vertex(vertex)?;
            let target = core.vertex(merging_to)?;
            if v.challenge != target.challenge {
                return Err(ChainError::InvalidOp(
                    "vertices belong to different challenges".to_string(),
                ));
            }
            if v.status != VertexStatus::Pending || target.status != VertexStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let chal = core.challenge(v.challenge)?;
            if chal.is_complete() {
                return Err(ChainError::WrongState);
            }
            if !core.eligible_for_new_successor(merging_to)? {
                return Err(ChainError::PastDeadline);
            }
            let prev = v.prev.ok_or(ChainError::OptionEmpty)?;
            if target.prev != Some(prev) {
                return Err(ChainError::InvalidOp(
                    "merge target does not share the vertex's predecessor".to_string(),
                ));
            }
            let expected = bisection_point(core.vertex(prev)?.height(), v.height())?;
            if target.height() != expected {
                return Err(ChainError::InvalidHeight);
            }
            if let Err(err) = verify_prefix_proof(
                target.commitment.merkle,
                target.height() + 1,
                v.commitment.merkle,
                v.height() + 1,
                &proof,
            ) {
                log::warn!("rejecting merge with an invalid prefix proof: {err}");
                return Err(ChainError::ProofFailsToVerify);
            }
            (v.challenge, prev)
        };

        let core = &mut *self.core;
        core.vertices[vertex.0].prev = Some(merging_to);
        let carried = core.vertices[vertex.0].ps_timer.get();
        core.vertices[merging_to.0].ps_timer.add(carried);
        // If the mover was its old parent's presumptive successor, hand the
        // role to the lowest remaining sibling.
        if core.vertices[prev.0].presumptive_successor == Some(vertex) {
            core.vertices[vertex.0].ps_timer.stop();
            core.vertices[prev.0].presumptive_successor = None;
            let mut lowest: Option<(u64, VertexId)> = None;
            for w in &core.vertices {
                if w.prev == Some(prev) && lowest.map_or(true, |(h, _)| w.height() < h) {
                    lowest = Some((w.height(), w.id));
                }
            }
            if let Some((_, sibling)) = lowest {
                core.vertices[prev.0].presumptive_successor = Some(sibling);
                core.vertices[sibling.0].ps_timer.start();
            }
        }
        let became_ps = core.update_presumptive_successor(merging_to, vertex);

        let deeper_vertex_seq_num = core.vertices[vertex.0].seq_num;
        let shallower_vertex_seq_num = core.vertices[merging_to.0].seq_num;
        self.feeds.challenges.append(ChallengeEvent::Merge {
            challenge,
            deeper_vertex_seq_num,
            shallower_vertex_seq_num,
            became_ps,
            validator,
        });
        Ok(())
    }

    /// Open a finer-granularity dispute beneath an unconfirmed vertex
    pub fn create_sub_challenge(&mut self, on_vertex: VertexId) -> Result<ChallengeId, ChainError> {
        let (parent_challenge, kind, root_assertion, on_seq_num) = {
            let core = &*self.core;
            let v = core.vertex(on_vertex)?;
            if v.sub_challenge.is_some() {
                return Err(ChainError::ChallengeAlreadyExists);
            }
            if v.status == VertexStatus::Confirmed {
                return Err(ChainError::WrongState);
            }
            let chal = core.challenge(v.challenge)?;
            let kind = chal.kind.sub_challenge_kind().ok_or_else(|| {
                ChainError::InvalidOp(
                    "small-step disputes resolve by one-step proof, not another challenge"
                        .to_string(),
                )
            })?;
            (v.challenge, kind, chal.root_assertion, v.seq_num)
        };

        let core = &mut *self.core;
        let now = core.time_ref.now();
        let challenge_id = ChallengeId(core.challenges.len());
        let root_id = VertexId(core.vertices.len());
        let mut ps_timer = CountUpTimer::new(Arc::clone(&core.time_ref));
        ps_timer.start();
        let root_commitment = HistoryCommitment::default();
        let root_hash = root_commitment.hash();
        core.vertices.push(ChallengeVertex {
            id: root_id,
            challenge: challenge_id,
            seq_num: 0,
            is_leaf: false,
            status: VertexStatus::Confirmed,
            commitment: root_commitment,
            prev: None,
            presumptive_successor: None,
            ps_timer,
            sub_challenge: None,
            winner_if_confirmed: None,
            winner_vertex_if_confirmed: None,
            mini_staker: None,
        });
        core.challenges.push(Challenge {
            id: challenge_id,
            kind,
            root_assertion,
            root_vertex: root_id,
            creation_time: now,
            included_histories: HashSet::new(),
            winner_vertex: None,
            winner_assertion: None,
            leaf_count: 0,
            next_vertex_seq_num: 1,
            claim_vertex: Some(on_vertex),
        });
        core.vertices[on_vertex.0].sub_challenge = Some(challenge_id);
        core.vertices_by_history
            .insert((challenge_id, root_hash), root_id);

        self.feeds.challenges.append(ChallengeEvent::SubChallenge {
            challenge: parent_challenge,
            sub_challenge: challenge_id,
            on_vertex_seq_num: on_seq_num,
        });
        Ok(challenge_id)
    }

    /// Claim a finer-granularity history for a successor of the
    /// sub-challenged vertex.
    ///
    /// Confirming the leaf hands the sub-challenge's win to `claimed_vertex`
    /// in the parent challenge.
    pub fn add_sub_challenge_leaf(
        &mut self,
        sub_challenge: ChallengeId,
        claimed_vertex: VertexId,
        history: HistoryCommitment,
        validator: Address,
    ) -> Result<VertexId, ChainError> {
        let root_vertex = {
            let core = &*self.core;
            let sub = core.challenge(sub_challenge)?;
            let claim_vertex = sub.claim_vertex.ok_or_else(|| {
                ChainError::InvalidOp("challenge does not hang beneath a vertex".to_string())
            })?;
            let claimed = core.vertex(claimed_vertex)?;
            let claim = core.vertex(claim_vertex)?;
            if claimed.challenge != claim.challenge {
                return Err(ChainError::InvalidOp(
                    "claimed vertex is outside the disputed challenge".to_string(),
                ));
            }
            if claimed.prev != Some(claim_vertex) {
                return Err(ChainError::InvalidOp(
                    "claimed vertex is not a successor of the disputed vertex".to_string(),
                ));
            }
            if sub.is_complete() {
                return Err(ChainError::WrongState);
            }
            if !core.eligible_for_new_successor(sub.root_vertex)? {
                return Err(ChainError::PastDeadline);
            }
            if sub.included_histories.contains(&history.hash()) {
                return Err(ChainError::VertexAlreadyExists);
            }
            if core.balance(validator) < CHALLENGE_VERTEX_STAKE {
                return Err(ChainError::InsufficientBalance);
            }
            if history.last_leaf_proof.is_empty() {
                return Err(ChainError::NoLastLeafProof);
            }
            if let Err(err) = history.verify_last_leaf() {
                log::warn!("rejecting sub-challenge leaf with a bad last-leaf proof: {err}");
                return Err(ChainError::ProofFailsToVerify);
            }
            if claim.height() > 0 && history.first_leaf != claim.commitment.last_leaf {
                log::warn!("rejecting sub-challenge leaf that does not start at the disputed state");
                return Err(ChainError::WrongFirstLeaf);
            }
            if history.last_leaf != claimed.commitment.last_leaf {
                log::warn!("rejecting sub-challenge leaf that does not end at the claimed state");
                return Err(ChainError::WrongLastLeaf);
            }
            if history.height == 0 {
                return Err(ChainError::InvalidHeight);
            }
            sub.root_vertex
        };

        self.debit(validator, CHALLENGE_VERTEX_STAKE)?;

        let core = &mut *self.core;
        let history_hash = history.hash();
        let vertex_id = VertexId(core.vertices.len());
        let seq_num = core.challenges[sub_challenge.0].next_vertex_seq_num;
        core.challenges[sub_challenge.0].next_vertex_seq_num += 1;
        core.vertices.push(ChallengeVertex {
            id: vertex_id,
            challenge: sub_challenge,
            seq_num,
            is_leaf: true,
            status: VertexStatus::Pending,
            commitment: history.clone(),
            prev: Some(root_vertex),
            presumptive_successor: None,
            ps_timer: CountUpTimer::new(Arc::clone(&core.time_ref)),
            sub_challenge: None,
            winner_if_confirmed: None,
            winner_vertex_if_confirmed: Some(claimed_vertex),
            mini_staker: Some(validator),
        });
        let became_ps = core.update_presumptive_successor(root_vertex, vertex_id);
        core.challenges[sub_challenge.0].leaf_count += 1;
        core.challenges[sub_challenge.0]
            .included_histories
            .insert(history_hash);
        core.vertices_by_history
            .insert((sub_challenge, history_hash), vertex_id);

        self.feeds.challenges.append(ChallengeEvent::Leaf {
            challenge: sub_challenge,
            vertex_seq_num: seq_num,
            history,
            winner_if_confirmed: None,
            became_ps,
            validator,
        });
        Ok(vertex_id)
    }

    /// Confirm a vertex whose timer outlasted the challenge period
    pub fn confirm_for_ps_timer(&mut self, vertex: VertexId) -> Result<(), ChainError> {
        {
            let core = &*self.core;
            let v = core.vertex(vertex)?;
            if v.status != VertexStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.vertex(v.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != VertexStatus::Confirmed {
                return Err(ChainError::WrongPredecessorState);
            }
            if prev.sub_challenge.is_some() {
                return Err(ChainError::InvalidOp(
                    "predecessor has an open sub-challenge".to_string(),
                ));
            }
            if v.ps_timer.get() <= core.challenge_period() {
                return Err(ChainError::NotYet);
            }
        }
        self.confirm_vertex(vertex);
        Ok(())
    }

    /// Confirm the presumptive successor once the whole challenge timed out
    pub fn confirm_for_challenge_deadline(&mut self, vertex: VertexId) -> Result<(), ChainError> {
        {
            let core = &*self.core;
            let v = core.vertex(vertex)?;
            if v.status != VertexStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.vertex(v.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != VertexStatus::Confirmed {
                return Err(ChainError::WrongPredecessorState);
            }
            if prev.presumptive_successor != Some(vertex) {
                return Err(ChainError::InvalidOp(
                    "only the presumptive successor confirms by deadline".to_string(),
                ));
            }
            if prev.sub_challenge.is_some() {
                return Err(ChainError::InvalidOp(
                    "predecessor has an open sub-challenge".to_string(),
                ));
            }
            let chal = core.challenge(v.challenge)?;
            if core.now() <= chal.creation_time + core.challenge_period() * 2 {
                return Err(ChainError::NotYet);
            }
        }
        self.confirm_vertex(vertex);
        Ok(())
    }

    /// Confirm a vertex that won its predecessor's sub-challenge
    pub fn confirm_for_sub_challenge_win(&mut self, vertex: VertexId) -> Result<(), ChainError> {
        {
            let core = &*self.core;
            let v = core.vertex(vertex)?;
            if v.status != VertexStatus::Pending {
                return Err(ChainError::WrongState);
            }
            let prev = core.vertex(v.prev.ok_or(ChainError::OptionEmpty)?)?;
            if prev.status != VertexStatus::Confirmed {
                return Err(ChainError::WrongPredecessorState);
            }
            let sub = prev.sub_challenge.ok_or_else(|| {
                ChainError::InvalidOp("predecessor has no sub-challenge".to_string())
            })?;
            let winner = core
                .challenge(sub)?
                .winner_vertex
                .ok_or(ChainError::NoWinnerYet)?;
            if winner != vertex {
                return Err(ChainError::InvalidOp(
                    "sub-challenge was won by a rival".to_string(),
                ));
            }
        }
        self.confirm_vertex(vertex);
        Ok(())
    }

    /// Flip a vertex to `Confirmed`; a confirming leaf decides its challenge
    /// and refunds its mini-staker.
    fn confirm_vertex(&mut self, vertex: VertexId) {
        let (challenge, vertex_seq_num, refund) = {
            let core = &mut *self.core;
            core.vertices[vertex.0].status = VertexStatus::Confirmed;
            let (challenge_id, is_leaf, winner_assertion, winner_vertex, mini_staker, seq_num) = {
                let v = &core.vertices[vertex.0];
                (
                    v.challenge,
                    v.is_leaf,
                    v.winner_if_confirmed,
                    v.winner_vertex_if_confirmed.unwrap_or(vertex),
                    v.mini_staker,
                    v.seq_num,
                )
            };
            let mut refund = None;
            if is_leaf {
                let chal = &mut core.challenges[challenge_id.0];
                chal.winner_vertex = Some(winner_vertex);
                chal.winner_assertion = winner_assertion;
                if let Some(staker) = mini_staker {
                    let amount = CHALLENGE_VERTEX_STAKE * (chal.leaf_count as u128 + 1) / 2;
                    refund = Some((staker, amount));
                }
            }
            (challenge_id, seq_num, refund)
        };
        if let Some((account, amount)) = refund {
            self.credit(account, amount);
        }
        log::info!("confirmed challenge vertex {vertex_seq_num} in challenge {}", challenge.0);
        self.feeds.challenges.append(ChallengeEvent::VertexConfirmed {
            challenge,
            vertex_seq_num,
        });
    }
}
