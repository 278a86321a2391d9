//! The canonical active-node list with error-driven eviction.

use crate::persistence::{NodePersistence, PersistenceError};
use dashmap::DashMap;
use parking_lot::RwLock;
use quorumkv_common::{Node, NodeStatus};
use quorumkv_ring::NodeChangeListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-node sliding error window.
#[derive(Debug)]
struct ErrorWindow {
    count: u32,
    window_start: Instant,
}

/// Owns the active node set and notifies locators on every change.
///
/// Liveness is inferred purely from operation outcomes: there is no
/// heartbeat subsystem. Each failed operation against a node increments its
/// counter; exceeding `max_error_count` inside one `error_count_period`
/// evicts the node.
pub struct NodeStore {
    persistence: Arc<dyn NodePersistence>,
    active: RwLock<Vec<Node>>,
    listeners: RwLock<Vec<Arc<dyn NodeChangeListener>>>,
    errors: DashMap<u32, ErrorWindow>,
    max_error_count: u32,
    error_count_period: Duration,
}

impl NodeStore {
    pub fn new(
        persistence: Arc<dyn NodePersistence>,
        max_error_count: u32,
        error_count_period: Duration,
    ) -> Self {
        Self {
            persistence,
            active: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            errors: DashMap::new(),
            max_error_count,
            error_count_period,
        }
    }

    /// Snapshot of the current active-node list.
    pub fn active_nodes(&self) -> Vec<Node> {
        self.active.read().clone()
    }

    pub fn active_node_count(&self) -> usize {
        self.active.read().len()
    }

    /// Register a listener and immediately seed it with the current list.
    pub fn register_listener(&self, listener: Arc<dyn NodeChangeListener>) {
        listener.set_active_nodes(&self.active_nodes());
        self.listeners.write().push(listener);
    }

    /// Reload membership from the persistence collaborator. Fires listeners
    /// only if the id-set actually changed; returns whether it did.
    pub fn refresh_active_nodes(&self) -> Result<bool, PersistenceError> {
        let loaded = self.persistence.load_active_nodes()?;

        let changed = {
            let current = self.active.read();
            let mut current_ids: Vec<u32> = current.iter().map(|n| n.id).collect();
            let mut loaded_ids: Vec<u32> = loaded.iter().map(|n| n.id).collect();
            current_ids.sort_unstable();
            loaded_ids.sort_unstable();
            current_ids != loaded_ids
        };

        if changed {
            tracing::info!(nodes = loaded.len(), "active node set changed on refresh");
            *self.active.write() = loaded;
            self.notify_listeners();
        }
        Ok(changed)
    }

    /// Persist and activate a node, then notify listeners. The external
    /// upsert runs first: the in-memory list only changes once the
    /// collaborator accepted the node.
    pub fn add_node(&self, node: Node) -> Result<(), PersistenceError> {
        self.persistence.persist_add(&node)?;
        {
            let mut active = self.active.write();
            if !active.iter().any(|n| n.id == node.id) {
                active.push(node);
            }
        }
        self.notify_listeners();
        Ok(())
    }

    /// Remove a node from the active set, then persist the removal.
    ///
    /// Memory first: the node must stop receiving traffic even if the
    /// collaborator is unreachable.
    pub fn remove_node(&self, node: &Node) -> Result<(), PersistenceError> {
        {
            let mut active = self.active.write();
            active.retain(|n| n.id != node.id);
        }
        self.notify_listeners();

        let mut removed = node.clone();
        removed.status = NodeStatus::Evicted;
        self.persistence.persist_remove(&removed)
    }

    /// Record one failed operation against `node`. Returns `true` if this
    /// error pushed the node over the eviction threshold.
    pub fn record_error(&self, node: &Node) -> bool {
        let now = Instant::now();
        let count = {
            let mut entry = self.errors.entry(node.id).or_insert_with(|| ErrorWindow {
                count: 0,
                window_start: now,
            });
            if now.duration_since(entry.window_start) > self.error_count_period {
                entry.count = 0;
                entry.window_start = now;
            }
            entry.count += 1;
            entry.count
        };

        if count > self.max_error_count {
            self.errors.remove(&node.id);
            self.evict(node);
            true
        } else {
            false
        }
    }

    /// The node's error count within the current window.
    pub fn error_count(&self, node: &Node) -> u32 {
        match self.errors.get(&node.id) {
            Some(entry) if Instant::now().duration_since(entry.window_start) <= self.error_count_period => {
                entry.count
            }
            _ => 0,
        }
    }

    fn evict(&self, node: &Node) {
        tracing::warn!(%node, "evicting node after repeated errors");
        quorumkv_metrics::metrics().evictions.inc();

        {
            let mut active = self.active.write();
            active.retain(|n| n.id != node.id);
        }

        let mut evicted = node.clone();
        evicted.status = NodeStatus::Evicted;
        if let Err(e) = self.persistence.persist_remove(&evicted) {
            tracing::warn!("failed to persist eviction of {}: {}", node, e);
        }

        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        let nodes = self.active_nodes();
        for listener in self.listeners.read().iter() {
            listener.set_active_nodes(&nodes);
        }
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("active", &self.active.read().len())
            .field("max_error_count", &self.max_error_count)
            .field("error_count_period", &self.error_count_period)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
