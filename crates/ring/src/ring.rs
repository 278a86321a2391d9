//! The hash ring: an ordered mapping from 64-bit positions to tokens.
//!
//! A ring is built once per membership change and never mutated afterwards;
//! locators publish each rebuilt ring as a fresh snapshot so concurrent
//! lookups observe either the old ring or the new one, never a mix.

use quorumkv_common::Node;
use std::collections::{BTreeMap, HashSet};

/// One slot on the ring: an ordinal (stable slot number) and the node
/// currently assigned to it.
#[derive(Debug, Clone)]
pub struct Token {
    pub ordinal: usize,
    pub node: Node,
}

/// Ordered mapping from signed 64-bit ring position to [`Token`].
///
/// Lookups treat the key space as circular: `place` wraps past the maximum
/// position back to the first entry, `lower` wraps below the minimum back to
/// the last entry.
#[derive(Debug, Default)]
pub struct HashRing {
    entries: BTreeMap<i64, Token>,
    node_count: usize,
}

impl HashRing {
    /// An empty ring (no nodes known yet).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a ring from (position, token) pairs.
    ///
    /// Position collisions are resolved by probing the next free position, so
    /// every token survives the build and positions are unique afterwards.
    pub fn build(entries: impl IntoIterator<Item = (i64, Token)>) -> Self {
        let mut map = BTreeMap::new();
        let mut nodes = HashSet::new();
        for (position, token) in entries {
            nodes.insert(token.node.id);
            let mut p = position;
            while map.contains_key(&p) {
                p = p.wrapping_add(1);
            }
            map.insert(p, token);
        }
        Self {
            entries: map,
            node_count: nodes.len(),
        }
    }

    /// The entry at or after `hash`, wrapping to the first entry when `hash`
    /// is past the last position. `None` only on an empty ring.
    pub fn place(&self, hash: i64) -> Option<(i64, &Token)> {
        self.entries
            .range(hash..)
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(p, t)| (*p, t))
    }

    /// The greatest entry strictly below `hash`.
    pub fn lower(&self, hash: i64) -> Option<(i64, &Token)> {
        self.entries.range(..hash).next_back().map(|(p, t)| (*p, t))
    }

    /// The least entry strictly above `hash`.
    pub fn higher(&self, hash: i64) -> Option<(i64, &Token)> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.entries
            .range((Excluded(hash), Unbounded))
            .next()
            .map(|(p, t)| (*p, t))
    }

    /// The first (lowest-position) entry.
    pub fn first(&self) -> Option<(i64, &Token)> {
        self.entries.iter().next().map(|(p, t)| (*p, t))
    }

    /// The last (highest-position) entry.
    pub fn last(&self) -> Option<(i64, &Token)> {
        self.entries.iter().next_back().map(|(p, t)| (*p, t))
    }

    /// Number of distinct nodes represented on the ring.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of ring slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
