//! Outer-ring locator, roughly strategy 3 from the Dynamo paper.
//!
//! Ring-position spacing is decoupled from node-to-position assignment: the
//! 64-bit space is first partitioned into equal-width slots, then nodes are
//! mapped onto slots through sorted per-node token hashes. This keeps slot
//! widths uniform (good load balance) while the assignment stays fully
//! determined by node salts.

use crate::locator::{LocatorError, NodeChangeListener, NodeLocator};
use crate::ring::{HashRing, Token};
use parking_lot::RwLock;
use quorumkv_common::{HashAlgorithm, Md5Hash, Node};
use std::sync::Arc;

pub const DEFAULT_TOKENS_PER_NODE: usize = 100;

pub struct DynamoNodeLocator {
    tokens_per_node: usize,
    token_hasher: Md5Hash,
    /// Current ring snapshot, replaced wholesale on rebuild. The lock guards
    /// only the pointer swap; lookups clone the `Arc` and read lock-free.
    ring: RwLock<Arc<HashRing>>,
}

impl DynamoNodeLocator {
    pub fn new(tokens_per_node: usize) -> Self {
        Self {
            tokens_per_node,
            token_hasher: Md5Hash,
            ring: RwLock::new(Arc::new(HashRing::empty())),
        }
    }

    fn snapshot(&self) -> Arc<HashRing> {
        self.ring.read().clone()
    }

    /// The primary token ordinal for a key. Exposed for distribution tests:
    /// per-token key counts reveal imbalance that per-node counts hide.
    pub fn primary_token(
        &self,
        alg: &dyn HashAlgorithm,
        key: &str,
    ) -> Result<usize, LocatorError> {
        let ring = self.snapshot();
        let (_, token) = ring.place(alg.hash(key)).ok_or(LocatorError::EmptyRing)?;
        Ok(token.ordinal)
    }

    fn rebuild(&self, nodes: &[Node]) {
        if nodes.is_empty() {
            *self.ring.write() = Arc::new(HashRing::empty());
            return;
        }

        let token_count = self.tokens_per_node * nodes.len();
        // Equal-width outer slots spanning the full signed 64-bit range.
        // The multiplication is allowed to wrap: positions stay distinct
        // because the total span is below 2^64.
        let token_size = (i64::MAX / token_count as i64) * 2;
        let mut slots: Vec<(i64, usize)> = (1..=token_count)
            .map(|i| {
                let position = i64::MIN.wrapping_add((i as i64).wrapping_mul(token_size));
                (position, i - 1)
            })
            .collect();
        slots.sort_by_key(|(position, _)| *position);

        // T deterministic token hashes per node, sorted ascending; the k-th
        // smallest hash assigns its node to the k-th slot.
        let mut token_hashes: Vec<(i64, &Node)> = Vec::with_capacity(token_count);
        for node in nodes {
            for i in 1..=self.tokens_per_node {
                let identifier = format!("{}{}", node.salt, i);
                token_hashes.push((self.token_hasher.hash(&identifier), node));
            }
        }
        token_hashes.sort_by_key(|(hash, _)| *hash);

        let ring = HashRing::build(slots.into_iter().zip(token_hashes).map(
            |((position, ordinal), (_, node))| {
                (
                    position,
                    Token {
                        ordinal,
                        node: node.clone(),
                    },
                )
            },
        ));
        tracing::debug!(
            slots = ring.len(),
            nodes = ring.node_count(),
            "rebuilt dynamo ring"
        );
        *self.ring.write() = Arc::new(ring);
    }
}

impl Default for DynamoNodeLocator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENS_PER_NODE)
    }
}

impl NodeLocator for DynamoNodeLocator {
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

        let mut hash = alg.hash(key);
        let mut results = Vec::with_capacity(count);
        if count == 0 {
            return Ok(results);
        }

        let Some((_, primary)) = ring.place(hash) else {
            return Err(LocatorError::EmptyRing);
        };
        results.push(primary.node.clone());

        // Walk the ring backward from the key hash, collecting the next
        // distinct node at each step.
        while results.len() < count {
            let Some((position, token)) = ring.lower(hash).or_else(|| ring.last()) else {
                return Err(LocatorError::EmptyRing);
            };
            if !results.contains(&token.node) {
                results.push(token.node.clone());
            }
            hash = position;
        }
        Ok(results)
    }

    fn get_primary_node(&self, alg: &dyn HashAlgorithm, key: &str) -> Result<Node, LocatorError> {
        let ring = self.snapshot();
        let (_, token) = ring.place(alg.hash(key)).ok_or(LocatorError::EmptyRing)?;
        Ok(token.node.clone())
    }
}

impl NodeChangeListener for DynamoNodeLocator {
    fn set_active_nodes(&self, nodes: &[Node]) {
        self.rebuild(nodes);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
