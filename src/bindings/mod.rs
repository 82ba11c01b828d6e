//! Bindings Module
//! Read-only collaborator contracts: the names an on-chain deployment (and
//! the storage mirror built on it) uses to pull state out of the core.
//! Encoding is the collaborator's concern; these traits fix the data shape.

use crate::chain::{AssertionChain, AssertionStatus, SeqNum};
use crate::pathtimer::{EdgeId, EdgeStatus, TimerError, TimerGraph, TrackedEdge};

/// Assertion-side data contract.
///
/// Child-creation instants are reported in whole seconds of the chain's
/// time reference, standing in for block numbers in the in-memory model.
pub trait AssertionChainReader {
    fn assertion_status(&self, seq_num: SeqNum) -> Option<AssertionStatus>;
    fn first_child_creation_block(&self, seq_num: SeqNum) -> Option<u64>;
    fn second_child_creation_block(&self, seq_num: SeqNum) -> Option<u64>;
    fn is_first_child(&self, seq_num: SeqNum) -> Option<bool>;
}

impl AssertionChainReader for AssertionChain {
    fn assertion_status(&self, seq_num: SeqNum) -> Option<AssertionStatus> {
        self.call(|tx| tx.assertion(seq_num).map(|a| a.status).ok())
    }

    fn first_child_creation_block(&self, seq_num: SeqNum) -> Option<u64> {
        self.call(|tx| {
            tx.assertion(seq_num)
                .ok()
                .and_then(|a| a.first_child_creation_time)
                .map(|t| t.as_secs())
        })
    }

    fn second_child_creation_block(&self, seq_num: SeqNum) -> Option<u64> {
        self.call(|tx| {
            tx.assertion(seq_num)
                .ok()
                .and_then(|a| a.second_child_creation_time)
                .map(|t| t.as_secs())
        })
    }

    fn is_first_child(&self, seq_num: SeqNum) -> Option<bool> {
        self.call(|tx| tx.assertion(seq_num).map(|a| a.is_first_child).ok())
    }
}

/// Challenge-side data contract over tracked edges.
pub trait ChallengeManagerReader {
    fn get_edge(&self, id: EdgeId) -> Option<TrackedEdge>;
    fn status(&self, id: EdgeId) -> Option<EdgeStatus>;
    fn has_rival(&self, id: EdgeId) -> Result<bool, TimerError>;
    fn has_length_one_rival(&self, id: EdgeId) -> Result<bool, TimerError>;
    fn time_unrivaled(&self, id: EdgeId, block: u64) -> Result<u64, TimerError>;
    fn lower_child(&self, id: EdgeId) -> Option<EdgeId>;
    fn upper_child(&self, id: EdgeId) -> Option<EdgeId>;
    fn assertion_hash(&self, id: EdgeId) -> Option<[u8; 32]>;
}

impl ChallengeManagerReader for TimerGraph {
    fn get_edge(&self, id: EdgeId) -> Option<TrackedEdge> {
        TimerGraph::get_edge(self, id)
    }

    fn status(&self, id: EdgeId) -> Option<EdgeStatus> {
        TimerGraph::get_edge(self, id).map(|edge| edge.status)
    }

    fn has_rival(&self, id: EdgeId) -> Result<bool, TimerError> {
        TimerGraph::has_rival(self, id)
    }

    fn has_length_one_rival(&self, id: EdgeId) -> Result<bool, TimerError> {
        TimerGraph::has_length_one_rival(self, id)
    }

    fn time_unrivaled(&self, id: EdgeId, block: u64) -> Result<u64, TimerError> {
        self.local_timer(id, block)
    }

    fn lower_child(&self, id: EdgeId) -> Option<EdgeId> {
        TimerGraph::get_edge(self, id).and_then(|edge| edge.lower_child)
    }

    fn upper_child(&self, id: EdgeId) -> Option<EdgeId> {
        TimerGraph::get_edge(self, id).and_then(|edge| edge.upper_child)
    }

    fn assertion_hash(&self, id: EdgeId) -> Option<[u8; 32]> {
        TimerGraph::get_edge(self, id).map(|edge| edge.assertion_hash)
    }
}
