//! Path-Timer Engine
//! Block-parameterized unrivaled-time tracking over a graph of challenge
//! edges. Rivals are found through shared mutual ids rather than edge scans;
//! a vertex's path timer is its own unrivaled time plus the best path timer
//! among its parents.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::utils::hash_utils::{be_word, keccak256};

/// Identity hash of a tracked edge.
pub type EdgeId = [u8; 32];

/// Cached path-timer results kept per `(edge, block)` query.
const TIMER_CACHE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("edge is not tracked")]
    UnknownEdge,

    #[error("target block precedes the edge's creation")]
    BlockBeforeCreation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStatus {
    Pending,
    Confirmed,
}

/// One challenge edge as reported by the on-chain data contract.
///
/// `mutual_id` commits the position rivals share (level, origin, start);
/// `id` additionally commits the end, so two edges with the same mutual id
/// and different ids are rivals by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEdge {
    pub challenge_level: u8,
    pub origin_id: [u8; 32],
    pub assertion_hash: [u8; 32],
    pub start_height: u64,
    pub start_root: [u8; 32],
    pub end_height: u64,
    pub end_root: [u8; 32],
    pub created_at_block: u64,
    pub status: EdgeStatus,
    pub lower_child: Option<EdgeId>,
    pub upper_child: Option<EdgeId>,
    pub claim_id: Option<[u8; 32]>,
}

impl TrackedEdge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        challenge_level: u8,
        origin_id: [u8; 32],
        assertion_hash: [u8; 32],
        start_height: u64,
        start_root: [u8; 32],
        end_height: u64,
        end_root: [u8; 32],
        created_at_block: u64,
    ) -> Self {
        Self {
            challenge_level,
            origin_id,
            assertion_hash,
            start_height,
            start_root,
            end_height,
            end_root,
            created_at_block,
            status: EdgeStatus::Pending,
            lower_child: None,
            upper_child: None,
            claim_id: None,
        }
    }

    fn mutual_preimage(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(160);
        data.extend_from_slice(&be_word(self.challenge_level as u64));
        data.extend_from_slice(&self.origin_id);
        data.extend_from_slice(&be_word(self.start_height));
        data.extend_from_slice(&self.start_root);
        data.extend_from_slice(&be_word(self.end_height));
        data
    }

    /// Position hash shared by this edge and all of its rivals: the claimed
    /// span, without the claimed end state
    pub fn mutual_id(&self) -> [u8; 32] {
        keccak256(&self.mutual_preimage())
    }

    /// Full identity hash, binding the claimed end state as well
    pub fn id(&self) -> EdgeId {
        let mut data = self.mutual_preimage();
        data.extend_from_slice(&self.end_root);
        keccak256(&data)
    }

    pub fn length(&self) -> u64 {
        self.end_height - self.start_height
    }
}

/// The edge graph behind path-timer queries.
///
/// Safe for concurrent tracking and querying; path-timer results are
/// memoized per `(edge, block)` and the cache is flushed whenever a mutual
/// group gains a member.
pub struct TimerGraph {
    edges: DashMap<EdgeId, TrackedEdge>,
    mutuals: DashMap<[u8; 32], Vec<EdgeId>>,
    parents: DashMap<EdgeId, Vec<EdgeId>>,
    timer_cache: Mutex<LruCache<(EdgeId, u64), u64>>,
}

impl TimerGraph {
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
            mutuals: DashMap::new(),
            parents: DashMap::new(),
            timer_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(TIMER_CACHE_SIZE).unwrap(),
            )),
        }
    }

    /// Register an edge, indexing its mutual id and child links
    pub fn track_edge(&self, edge: TrackedEdge) -> EdgeId {
        let id = edge.id();
        let mutual = edge.mutual_id();
        if let Some(lower) = edge.lower_child {
            let mut links = self.parents.entry(lower).or_default();
            if !links.contains(&id) {
                links.push(id);
            }
        }
        if let Some(upper) = edge.upper_child {
            let mut links = self.parents.entry(upper).or_default();
            if !links.contains(&id) {
                links.push(id);
            }
        }
        let gained_rival = {
            let mut group = self.mutuals.entry(mutual).or_default();
            if !group.contains(&id) {
                group.push(id);
            }
            group.len() > 1
        };
        self.edges.insert(id, edge);
        if gained_rival {
            // A new rival can change local timers computed earlier.
            self.timer_cache.lock().clear();
        }
        id
    }

    /// Record the two children an edge was bisected into
    pub fn set_children(
        &self,
        id: EdgeId,
        lower_child: EdgeId,
        upper_child: EdgeId,
    ) -> Result<(), TimerError> {
        {
            let mut edge = self.edges.get_mut(&id).ok_or(TimerError::UnknownEdge)?;
            edge.lower_child = Some(lower_child);
            edge.upper_child = Some(upper_child);
        }
        for child in [lower_child, upper_child] {
            let mut links = self.parents.entry(child).or_default();
            if !links.contains(&id) {
                links.push(id);
            }
        }
        self.timer_cache.lock().clear();
        Ok(())
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<TrackedEdge> {
        self.edges.get(&id).map(|edge| edge.clone())
    }

    pub fn contains(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Snapshot of every tracked edge, in no particular order
    pub fn edges_snapshot(&self) -> Vec<TrackedEdge> {
        self.edges.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Edges recording `id` as their lower or upper child
    pub fn parents_of(&self, id: EdgeId) -> Vec<EdgeId> {
        self.parents
            .get(&id)
            .map(|links| links.clone())
            .unwrap_or_default()
    }

    /// Edges sharing `id`'s mutual id with a different history
    pub fn rivals(&self, id: EdgeId) -> Result<Vec<EdgeId>, TimerError> {
        let mutual = {
            let edge = self.edges.get(&id).ok_or(TimerError::UnknownEdge)?;
            edge.mutual_id()
        };
        Ok(self
            .mutuals
            .get(&mutual)
            .map(|group| group.iter().copied().filter(|rival| *rival != id).collect())
            .unwrap_or_default())
    }

    pub fn has_rival(&self, id: EdgeId) -> Result<bool, TimerError> {
        Ok(!self.rivals(id)?.is_empty())
    }

    /// Whether this is a length-one edge with a rival
    pub fn has_length_one_rival(&self, id: EdgeId) -> Result<bool, TimerError> {
        let length = {
            let edge = self.edges.get(&id).ok_or(TimerError::UnknownEdge)?;
            edge.length()
        };
        Ok(length == 1 && self.has_rival(id)?)
    }

    /// Creation block of the earliest rival, if any
    pub fn earliest_rival_block(&self, id: EdgeId) -> Result<Option<u64>, TimerError> {
        let mut earliest = None;
        for rival in self.rivals(id)? {
            if let Some(edge) = self.edges.get(&rival) {
                let block = edge.created_at_block;
                earliest = Some(earliest.map_or(block, |current: u64| current.min(block)));
            }
        }
        Ok(earliest)
    }

    /// Whether the edge stands unrivaled at `block`
    pub fn unrivaled_at(&self, id: EdgeId, block: u64) -> Result<bool, TimerError> {
        let created_at = {
            let edge = self.edges.get(&id).ok_or(TimerError::UnknownEdge)?;
            edge.created_at_block
        };
        if block < created_at {
            return Err(TimerError::BlockBeforeCreation);
        }
        Ok(match self.earliest_rival_block(id)? {
            None => true,
            Some(earliest) => earliest > block.max(created_at),
        })
    }

    /// Blocks the edge spent unrivaled by `block`.
    ///
    /// Only the earliest rival counts, so late arrivals never rewind a
    /// previously observed value.
    pub fn local_timer(&self, id: EdgeId, block: u64) -> Result<u64, TimerError> {
        let created_at = {
            let edge = self.edges.get(&id).ok_or(TimerError::UnknownEdge)?;
            edge.created_at_block
        };
        if block < created_at {
            return Ok(0);
        }
        Ok(match self.earliest_rival_block(id)? {
            None => block - created_at,
            Some(earliest) => earliest.min(block).saturating_sub(created_at),
        })
    }

    /// Accumulated unrivaled time along the edge's ancestry at `block`:
    /// its local timer plus the maximum path timer among its parents.
    ///
    /// Iterative over the multi-parent DAG; an edge reachable through
    /// several parents (after merges) contributes its best ancestry.
    pub fn path_timer(&self, id: EdgeId, block: u64) -> Result<u64, TimerError> {
        if !self.edges.contains_key(&id) {
            return Err(TimerError::UnknownEdge);
        }
        if let Some(cached) = self.timer_cache.lock().get(&(id, block)) {
            return Ok(*cached);
        }

        let mut memo: HashMap<EdgeId, u64> = HashMap::new();
        let mut visiting: HashSet<EdgeId> = HashSet::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if memo.contains_key(&current) {
                continue;
            }
            let parents = self.parents_of(current);
            if expanded {
                let local = self.local_timer(current, block)?;
                let best_parent = parents
                    .iter()
                    .filter_map(|parent| memo.get(parent).copied())
                    .max()
                    .unwrap_or(0);
                memo.insert(current, local + best_parent);
            } else {
                if !visiting.insert(current) {
                    continue;
                }
                stack.push((current, true));
                for parent in parents {
                    if !memo.contains_key(&parent) && self.edges.contains_key(&parent) {
                        stack.push((parent, false));
                    }
                }
            }
        }

        let result = memo[&id];
        self.timer_cache.lock().put((id, block), result);
        Ok(result)
    }
}

impl Default for TimerGraph {
    fn default() -> Self {
        Self::new()
    }
}
