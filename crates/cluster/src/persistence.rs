//! External persistence hook for node membership.
//!
//! Real deployments back this with a relational table or a discovery
//! service; the core only needs load/upsert/remove. [`StaticNodePersistence`]
//! is the in-memory implementation used by tests and fixed clusters.

use parking_lot::Mutex;
use quorumkv_common::{Node, NodeStatus};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence I/O failure: {0}")]
    Io(String),
    #[error("persistence misconfigured: {0}")]
    Configuration(String),
}

/// Durable membership collaborator, called synchronously by the node store.
///
/// Failures are refresh/mutation failures, not crashes: the store surfaces
/// them to the caller and leaves in-memory state consistent.
pub trait NodePersistence: Send + Sync {
    /// All nodes currently marked active in the external system.
    fn load_active_nodes(&self) -> Result<Vec<Node>, PersistenceError>;

    /// Upsert a node as active.
    fn persist_add(&self, node: &Node) -> Result<(), PersistenceError>;

    /// Mark a node as evicted/removed.
    fn persist_remove(&self, node: &Node) -> Result<(), PersistenceError>;
}

/// In-memory membership list.
#[derive(Debug, Default)]
pub struct StaticNodePersistence {
    nodes: Mutex<Vec<Node>>,
}

impl StaticNodePersistence {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
        }
    }
}

impl NodePersistence for StaticNodePersistence {
    fn load_active_nodes(&self) -> Result<Vec<Node>, PersistenceError> {
        Ok(self
            .nodes
            .lock()
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .cloned()
            .collect())
    }

    fn persist_add(&self, node: &Node) -> Result<(), PersistenceError> {
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.iter_mut().find(|n| n.id == node.id) {
            existing.status = NodeStatus::Active;
        } else {
            let mut added = node.clone();
            added.status = NodeStatus::Active;
            nodes.push(added);
        }
        Ok(())
    }

    fn persist_remove(&self, node: &Node) -> Result<(), PersistenceError> {
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.iter_mut().find(|n| n.id == node.id) {
            existing.status = NodeStatus::Evicted;
        }
        Ok(())
    }
}
