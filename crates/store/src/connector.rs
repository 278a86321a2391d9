//! Resolves a [`Node`] descriptor to its backend capability.
//!
//! The seam between the coordination core and whatever transport actually
//! reaches a node. Real deployments parse `connection_uri` and pool
//! connections; [`StaticConnector`] maps node ids to in-process backends for
//! tests and embedded clusters.

use crate::capability::{BackendError, StoreCapability};
use quorumkv_common::Node;
use std::collections::HashMap;
use std::sync::Arc;

pub trait StoreConnector: Send + Sync + 'static {
    fn connect(&self, node: &Node) -> Result<Arc<dyn StoreCapability>, BackendError>;
}

/// Fixed node-id to capability mapping.
#[derive(Default)]
pub struct StaticConnector {
    backends: HashMap<u32, Arc<dyn StoreCapability>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_id: u32, capability: Arc<dyn StoreCapability>) {
        self.backends.insert(node_id, capability);
    }

    pub fn with(mut self, node_id: u32, capability: Arc<dyn StoreCapability>) -> Self {
        self.register(node_id, capability);
        self
    }
}

impl StoreConnector for StaticConnector {
    fn connect(&self, node: &Node) -> Result<Arc<dyn StoreCapability>, BackendError> {
        self.backends
            .get(&node.id)
            .cloned()
            .ok_or_else(|| BackendError::Unavailable(format!("no backend for {}", node)))
    }
}
