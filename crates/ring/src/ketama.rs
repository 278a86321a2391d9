//! Ketama-style locator: virtual positions hashed directly per node.
//!
//! Simpler than the outer-ring strategy: each node contributes
//! `tokens_per_node` positions at `hash(salt + i)` and keys resolve with a
//! plain ceiling search. Load balance depends entirely on hash dispersion.

use crate::locator::{LocatorError, NodeChangeListener, NodeLocator};
use crate::ring::{HashRing, Token};
use parking_lot::RwLock;
use quorumkv_common::{HashAlgorithm, KetamaHash, Node};
use std::sync::Arc;

pub const DEFAULT_TOKENS_PER_NODE: usize = 160;

pub struct KetamaNodeLocator {
    tokens_per_node: usize,
    token_hasher: KetamaHash,
    /// Current ring snapshot, replaced wholesale on rebuild.
    ring: RwLock<Arc<HashRing>>,
}

impl KetamaNodeLocator {
    pub fn new(tokens_per_node: usize) -> Self {
        Self {
            tokens_per_node,
            token_hasher: KetamaHash,
            ring: RwLock::new(Arc::new(HashRing::empty())),
        }
    }

    fn snapshot(&self) -> Arc<HashRing> {
        self.ring.read().clone()
    }

    fn rebuild(&self, nodes: &[Node]) {
        let mut ordinal = 0;
        let mut entries = Vec::with_capacity(self.tokens_per_node * nodes.len());
        for node in nodes {
            for i in 1..=self.tokens_per_node {
                let position = self.token_hasher.hash(&format!("{}{}", node.salt, i));
                entries.push((
                    position,
                    Token {
                        ordinal,
                        node: node.clone(),
                    },
                ));
                ordinal += 1;
            }
        }
        let ring = HashRing::build(entries);
        tracing::debug!(
            slots = ring.len(),
            nodes = ring.node_count(),
            "rebuilt ketama ring"
        );
        *self.ring.write() = Arc::new(ring);
    }
}

impl Default for KetamaNodeLocator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENS_PER_NODE)
    }
}

impl NodeLocator for KetamaNodeLocator {
    fn get_preference_list(
        &self,
        alg: &dyn HashAlgorithm,
        key: &str,
        count: usize,
    ) -> Result<Vec<Node>, LocatorError> {
        let ring = self.snapshot();
        if count > ring.node_count() {
            return Err(LocatorError::CountExceedsNodes {
                requested: count,
                available: ring.node_count(),
            });
        }

        let mut results = Vec::with_capacity(count);
        if count == 0 {
            return Ok(results);
        }

        let Some((mut cursor, primary)) = ring.place(alg.hash(key)) else {
            return Err(LocatorError::EmptyRing);
        };
        results.push(primary.node.clone());

        // Walk forward from the primary, skipping nodes already selected.
        while results.len() < count {
            let Some((position, token)) = ring.higher(cursor).or_else(|| ring.first()) else {
                return Err(LocatorError::EmptyRing);
            };
            if !results.contains(&token.node) {
                results.push(token.node.clone());
            }
            cursor = position;
        }
        Ok(results)
    }

    fn get_primary_node(&self, alg: &dyn HashAlgorithm, key: &str) -> Result<Node, LocatorError> {
        let ring = self.snapshot();
        let (_, token) = ring.place(alg.hash(key)).ok_or(LocatorError::EmptyRing)?;
        Ok(token.node.clone())
    }
}

impl NodeChangeListener for KetamaNodeLocator {
    fn set_active_nodes(&self, nodes: &[Node]) {
        self.rebuild(nodes);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn node_list(physical_hosts: u32, nodes_per_host: u32) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut id = 1;
        for host in 1..=physical_hosts {
            for j in 0..nodes_per_host {
                nodes.push(Node::new(
                    id,
                    host,
                    format!("salt:{}:{}", host, j),
                    format!("uri://host{}:{}", host, 1000 + j),
                ));
                id += 1;
            }
        }
        nodes
    }

    fn locator_for(nodes: &[Node]) -> KetamaNodeLocator {
        let locator = KetamaNodeLocator::default();
        locator.set_active_nodes(nodes);
        locator
    }

    #[test]
    fn test_preference_list_distinct() {
        let nodes = node_list(4, 2);
        let locator = locator_for(&nodes);
        let alg = KetamaHash;

        for key_id in 0..200 {
            let key = format!("key-{}", key_id);
            for count in 1..=nodes.len() {
                let list = locator.get_preference_list(&alg, &key, count).unwrap();
                assert_eq!(list.len(), count);
                let distinct: std::collections::HashSet<u32> =
                    list.iter().map(|n| n.id).collect();
                assert_eq!(distinct.len(), count);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let nodes = node_list(3, 2);
        let locator = locator_for(&nodes);
        let alg = KetamaHash;

        let first = locator.get_preference_list(&alg, "stable-key", 3).unwrap();
        for _ in 0..10 {
            assert_eq!(
                locator.get_preference_list(&alg, "stable-key", 3).unwrap(),
                first
            );
        }
    }

    #[test]
    fn test_count_exceeding_nodes_is_error() {
        let locator = locator_for(&node_list(1, 2));
        assert!(locator
            .get_preference_list(&KetamaHash, "k", 5)
            .is_err());
    }

    #[test]
    fn test_empty_ring_is_error() {
        let locator = KetamaNodeLocator::default();
        assert!(matches!(
            locator.get_primary_node(&KetamaHash, "k"),
            Err(LocatorError::EmptyRing)
        ));
    }

    #[test]
    fn test_physical_node_key_distribution() {
        let nodes = node_list(10, 3);
        let locator = locator_for(&nodes);
        let alg = KetamaHash;
        let mut rng = rand::thread_rng();

        let total_keys = 100_000;
        let mut assignments = vec![0u64; nodes.len()];
        for _ in 0..total_keys {
            let key = format!(
                "/blobs/users/{}/{}/{}",
                rng.gen_range(0..100),
                rng.gen_range(0..10_000),
                rng.gen::<u32>()
            );
            for node in locator.get_preference_list(&alg, &key, 3).unwrap() {
                assignments[(node.id - 1) as usize] += 1;
            }
        }

        let mean = (total_keys * 3) as f64 / nodes.len() as f64;
        let variance = assignments
            .iter()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / assignments.len() as f64;
        let stdev = variance.sqrt();
        assert!(
            stdev <= mean * 0.4,
            "per-node key counts too uneven: mean={}, stdev={}",
            mean,
            stdev
        );
    }
}
