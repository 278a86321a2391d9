//! quorumkv-common: shared types for the quorumkv project.
//!
//! Provides the [`Node`] descriptor that identifies one replica endpoint and
//! the [`HashAlgorithm`] trait with the two digest-based implementations the
//! locator strategies build on.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// HashAlgorithm
// ---------------------------------------------------------------------------

/// Maps an arbitrary string onto the signed 64-bit ring space.
///
/// Implementations must be pure and deterministic: the same key always yields
/// the same hash. Locators rely on this to keep key placement stable across
/// processes and restarts.
pub trait HashAlgorithm: Send + Sync {
    fn hash(&self, key: &str) -> i64;
}

/// Folds the low eight bytes of an MD5 digest into a signed 64-bit value.
///
/// The fold is `l = (l << 8) ^ (byte & 0xff)` over digest bytes 8..16, so the
/// full signed range is produced, not just non-negative values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hash;

impl HashAlgorithm for Md5Hash {
    fn hash(&self, key: &str) -> i64 {
        let digest = Md5::digest(key.as_bytes());
        let mut l: i64 = 0;
        for byte in &digest[8..16] {
            l <<= 8;
            l ^= *byte as i64 & 0xff;
        }
        l
    }
}

/// Ketama-compatible hash: the first four MD5 digest bytes assembled
/// little-endian into an unsigned 32-bit value, widened to `i64`.
///
/// Output is always in `0..=u32::MAX`, which keeps Ketama rings in the
/// non-negative quarter of the 64-bit space. That is fine: lookups only need
/// ordering, not range coverage.
#[derive(Debug, Clone, Copy, Default)]
pub struct KetamaHash;

impl HashAlgorithm for KetamaHash {
    fn hash(&self, key: &str) -> i64 {
        let digest = Md5::digest(key.as_bytes());
        let h = (digest[3] as u32) << 24
            | (digest[2] as u32) << 16
            | (digest[1] as u32) << 8
            | digest[0] as u32;
        h as i64
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Liveness status of a node as tracked by the node store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    Evicted,
}

/// Descriptor for one physical or virtual store endpoint.
///
/// Identity is the numeric `id` alone; equality and hashing ignore the other
/// fields. `physical_id` groups several virtual nodes on one host so
/// distribution tests can measure per-host fairness. `salt` seeds
/// deterministic token generation and must be unique per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub physical_id: u32,
    pub salt: String,
    pub connection_uri: String,
    pub status: NodeStatus,
}

impl Node {
    pub fn new(
        id: u32,
        physical_id: u32,
        salt: impl Into<String>,
        connection_uri: impl Into<String>,
    ) -> Self {
        Self {
            id,
            physical_id,
            salt: salt.into(),
            connection_uri: connection_uri.into(),
            status: NodeStatus::Active,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} (host {})", self.id, self.physical_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hash_deterministic() {
        let alg = Md5Hash;
        assert_eq!(alg.hash("hello"), alg.hash("hello"));
        assert_ne!(alg.hash("key-a"), alg.hash("key-b"));
    }

    #[test]
    fn test_md5_hash_covers_negative_range() {
        // With a fold over the full low 8 digest bytes, roughly half of a
        // large key sample must land below zero.
        let alg = Md5Hash;
        let negative = (0..10_000)
            .filter(|i| alg.hash(&format!("key-{}", i)) < 0)
            .count();
        assert!(
            (3_000..7_000).contains(&negative),
            "expected a roughly even split, got {} negative",
            negative
        );
    }

    #[test]
    fn test_ketama_hash_range() {
        let alg = KetamaHash;
        for i in 0..1_000 {
            let h = alg.hash(&format!("key-{}", i));
            assert!((0..=u32::MAX as i64).contains(&h));
        }
    }

    #[test]
    fn test_ketama_hash_deterministic() {
        let alg = KetamaHash;
        assert_eq!(alg.hash("abc"), alg.hash("abc"));
        assert_ne!(alg.hash("abc"), alg.hash("abd"));
    }

    #[test]
    fn test_node_identity_is_id_only() {
        let a = Node::new(1, 1, "salt:1:0", "uri://host1:100");
        let mut b = Node::new(1, 2, "salt:2:0", "uri://host2:200");
        b.status = NodeStatus::Evicted;
        assert_eq!(a, b);

        let c = Node::new(2, 1, "salt:1:1", "uri://host1:100");
        assert_ne!(a, c);
    }

    #[test]
    fn test_node_serde_roundtrip() {
        let node = Node::new(7, 3, "salt:3:1", "uri://host3:42");
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
        assert_eq!(back.salt, "salt:3:1");
        assert_eq!(back.status, NodeStatus::Active);
    }
}
