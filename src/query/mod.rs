//! Snapshot Query Module
//! The read-only query surface the storage mirror consumes: assertion and
//! edge rows with an additive filter set, pagination and ordering. Purely
//! in-memory; column types and SQL are the mirror's concern.

use serde::{Deserialize, Serialize};

use crate::chain::{Address, AssertionChain, AssertionStatus, SeqNum};
use crate::pathtimer::{EdgeId, EdgeStatus, TimerGraph};

/// Query errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unsupported query: {0}")]
    Unsupported(&'static str),

    #[error("invalid query parameters: {0}")]
    InvalidParameters(String),
}

/// Row ordering by creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    CreationAsc,
    CreationDesc,
}

/// Additive filter set; every `with_*` narrows the result (logical AND).
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub assertion_hash: Option<[u8; 32]>,
    pub edge_id: Option<EdgeId>,
    pub challenge_level: Option<u8>,
    pub created_at_block: Option<u64>,
    pub origin_id: Option<[u8; 32]>,
    pub start_history_commitment: Option<(u64, [u8; 32])>,
    pub end_history_commitment: Option<(u64, [u8; 32])>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order_by: Option<OrderBy>,
    pub force_update: bool,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assertion_hash(mut self, hash: [u8; 32]) -> Self {
        self.assertion_hash = Some(hash);
        self
    }

    pub fn with_edge_id(mut self, id: EdgeId) -> Self {
        self.edge_id = Some(id);
        self
    }

    pub fn with_challenge_level(mut self, level: u8) -> Self {
        self.challenge_level = Some(level);
        self
    }

    pub fn with_created_at_block(mut self, block: u64) -> Self {
        self.created_at_block = Some(block);
        self
    }

    pub fn with_origin_id(mut self, origin_id: [u8; 32]) -> Self {
        self.origin_id = Some(origin_id);
        self
    }

    /// Accepted but not yet applied: the matching rule for partial history
    /// commitments is still undefined on the mirror side.
    // TODO: apply this filter once the mirror settles how start commitments
    // are matched (exact pair vs. height-only).
    pub fn with_start_history_commitment(mut self, height: u64, root: [u8; 32]) -> Self {
        self.start_history_commitment = Some((height, root));
        self
    }

    /// Accepted but not yet applied, like `with_start_history_commitment`.
    pub fn with_end_history_commitment(mut self, height: u64, root: [u8; 32]) -> Self {
        self.end_history_commitment = Some((height, root));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Re-resolve mutable status fields from the core before returning
    pub fn with_force_update(mut self) -> Self {
        self.force_update = true;
        self
    }
}

/// One assertion as the mirror persists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRow {
    pub seq_num: SeqNum,
    pub assertion_hash: [u8; 32],
    pub height: u64,
    pub state_root: [u8; 32],
    pub prev_seq_num: Option<SeqNum>,
    pub status: AssertionStatus,
    pub is_first_child: bool,
    pub first_child_creation_secs: Option<u64>,
    pub second_child_creation_secs: Option<u64>,
    pub staker: Option<Address>,
}

/// One tracked edge as the mirror persists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: EdgeId,
    pub mutual_id: [u8; 32],
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
    pub has_rival: bool,
}

/// Read-only snapshot queries over the core
pub struct SnapshotQuery<'a> {
    chain: &'a AssertionChain,
    edges: Option<&'a TimerGraph>,
}

impl<'a> SnapshotQuery<'a> {
    pub fn new(chain: &'a AssertionChain) -> Self {
        Self { chain, edges: None }
    }

    pub fn with_edges(chain: &'a AssertionChain, edges: &'a TimerGraph) -> Self {
        Self {
            chain,
            edges: Some(edges),
        }
    }

    /// Assertions matching the filters, in the requested order
    pub fn assertions(&self, filters: QueryFilters) -> Result<Vec<AssertionRow>, QueryError> {
        let mut rows: Vec<AssertionRow> = self.chain.call(|tx| {
            (0..tx.num_assertions())
                .filter_map(|seq_num| tx.assertion(seq_num).ok().map(Self::assertion_row))
                .collect()
        });

        if let Some(hash) = filters.assertion_hash {
            rows.retain(|row| row.assertion_hash == hash);
        }
        if let Some(OrderBy::CreationDesc) = filters.order_by {
            rows.reverse();
        }
        let rows = Self::paginate(rows, filters.offset, filters.limit);

        if filters.force_update {
            // Status and child timestamps are the mutable columns; refresh
            // them against the live core before handing the rows out.
            return Ok(self.chain.call(|tx| {
                rows.into_iter()
                    .map(|row| match tx.assertion(row.seq_num) {
                        Ok(assertion) => Self::assertion_row(assertion),
                        Err(_) => row,
                    })
                    .collect()
            }));
        }
        Ok(rows)
    }

    /// Tracked edges matching the filters, ordered by creation block
    pub fn edges(&self, filters: QueryFilters) -> Result<Vec<EdgeRow>, QueryError> {
        let graph = self.edges.ok_or_else(|| {
            QueryError::InvalidParameters("no edge source attached to this snapshot".to_string())
        })?;

        let mut rows: Vec<EdgeRow> = graph
            .edges_snapshot()
            .into_iter()
            .map(|edge| {
                let id = edge.id();
                EdgeRow {
                    id,
                    mutual_id: edge.mutual_id(),
                    challenge_level: edge.challenge_level,
                    origin_id: edge.origin_id,
                    assertion_hash: edge.assertion_hash,
                    start_height: edge.start_height,
                    start_root: edge.start_root,
                    end_height: edge.end_height,
                    end_root: edge.end_root,
                    created_at_block: edge.created_at_block,
                    status: edge.status,
                    lower_child: edge.lower_child,
                    upper_child: edge.upper_child,
                    claim_id: edge.claim_id,
                    has_rival: graph.has_rival(id).unwrap_or(false),
                }
            })
            .collect();

        if let Some(id) = filters.edge_id {
            rows.retain(|row| row.id == id);
        }
        if let Some(level) = filters.challenge_level {
            rows.retain(|row| row.challenge_level == level);
        }
        if let Some(origin_id) = filters.origin_id {
            rows.retain(|row| row.origin_id == origin_id);
        }
        if let Some(block) = filters.created_at_block {
            rows.retain(|row| row.created_at_block == block);
        }
        if let Some(hash) = filters.assertion_hash {
            rows.retain(|row| row.assertion_hash == hash);
        }
        rows.sort_by_key(|row| row.created_at_block);
        if let Some(OrderBy::CreationDesc) = filters.order_by {
            rows.reverse();
        }
        Ok(Self::paginate(rows, filters.offset, filters.limit))
    }

    /// Deliberate placeholder: mini-stake enumeration is not implemented
    pub fn get_mini_stakes(&self) -> Result<Vec<(Address, u128)>, QueryError> {
        Err(QueryError::Unsupported("mini-stake enumeration"))
    }

    /// Deliberate placeholder: not implemented on the query surface
    pub fn latest_confirmed_assertion(&self) -> Result<AssertionRow, QueryError> {
        Err(QueryError::Unsupported("latest confirmed assertion lookup"))
    }

    fn assertion_row(assertion: &crate::chain::Assertion) -> AssertionRow {
        AssertionRow {
            seq_num: assertion.seq_num,
            assertion_hash: assertion.state_commitment.hash(),
            height: assertion.state_commitment.height,
            state_root: assertion.state_commitment.state_root,
            prev_seq_num: assertion.prev,
            status: assertion.status,
            is_first_child: assertion.is_first_child,
            first_child_creation_secs: assertion.first_child_creation_time.map(|t| t.as_secs()),
            second_child_creation_secs: assertion.second_child_creation_time.map(|t| t.as_secs()),
            staker: assertion.staker,
        }
    }

    fn paginate<T>(rows: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
        rows.into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }
}
