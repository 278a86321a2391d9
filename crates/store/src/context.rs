//! Node-rank reconciliation of divergent read replies.
//!
//! Replies carry the preference-list rank of the node that produced them.
//! Reconciliation is rank-ordered: the value returned by the lowest-ranked
//! replica that holds one wins, and lower-ranked replicas that came back
//! empty or failed are scheduled for repair writes carrying the winner.

use crate::operation::{Operation, OperationResult, OperationStatus};
use bytes::Bytes;
use quorumkv_common::Node;
use quorumkv_config::ClusterConfig;

/// One replica's reply to a read, tagged with its preference-list rank.
#[derive(Debug, Clone)]
pub struct Context {
    pub key: String,
    pub value: Option<Bytes>,
    pub source_node: Node,
    pub node_rank: usize,
    pub status: OperationStatus,
}

impl Context {
    pub fn from_result(key: impl Into<String>, node_rank: usize, result: OperationResult) -> Self {
        Self {
            key: key.into(),
            value: result.value,
            source_node: result.node,
            node_rank,
            status: result.status,
        }
    }
}

/// Outcome of reconciling one key's read replies.
#[derive(Debug)]
pub struct ContextFilterResult {
    /// The reconciled value; `None` when no replica holds one.
    pub value: Option<Bytes>,
    /// The node whose reply won.
    pub winner: Node,
    /// Repair writes to bring stale replicas up to the winning value.
    pub repairs: Vec<Operation>,
}

/// Rank-based reconciliation with configurable repair policy.
#[derive(Debug, Clone, Copy)]
pub struct NodeRankContextFilter {
    fill_null: bool,
    fill_error: bool,
}

impl NodeRankContextFilter {
    pub fn new(fill_null: bool, fill_error: bool) -> Self {
        Self { fill_null, fill_error }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(config.fill_null_get_results, config.fill_error_get_results)
    }

    /// Reconcile the replies for a single key.
    ///
    /// The winner is the lowest-ranked replica that returned a value.
    /// Returns `None` when no replica holds one, which the caller reads as
    /// "key absent"; nothing is repaired in that case.
    pub fn filter(&self, mut contexts: Vec<Context>) -> Option<ContextFilterResult> {
        contexts.sort_by_key(|c| c.node_rank);

        let winner_index = contexts
            .iter()
            .position(|c| c.status == OperationStatus::Success && c.value.is_some())?;
        let winner = &contexts[winner_index];
        let value = winner.value.clone();
        let winner_node = winner.source_node.clone();

        let Some(v) = value.clone() else {
            return None;
        };
        let repairs = contexts
            .iter()
            .filter(|c| c.source_node.id != winner_node.id)
            .filter(|c| match c.status {
                OperationStatus::NullValue => self.fill_null,
                OperationStatus::Error => self.fill_error,
                OperationStatus::Success => false,
            })
            .map(|c| Operation::set(c.key.clone(), v.clone(), c.source_node.clone()))
            .collect();

        Some(ContextFilterResult {
            value,
            winner: winner_node,
            repairs,
        })
    }
}
