//! The locator contract and membership-change callback.

use quorumkv_common::{HashAlgorithm, Node};

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("ring is currently empty")]
    EmptyRing,
    #[error("requested count ({requested}) is greater than node count ({available})")]
    CountExceedsNodes { requested: usize, available: usize },
}

/// Converts a key into an ordered list of distinct replica nodes.
///
/// Both strategies are deterministic for a fixed active-node set: repeated
/// calls with the same key return identical lists until membership changes.
pub trait NodeLocator: Send + Sync {
    /// The ordered preference list for `key`, exactly `count` distinct nodes.
    ///
    /// Requesting more nodes than the ring holds is a programming error and
    /// reported as [`LocatorError::CountExceedsNodes`], never retried.
    fn get_preference_list(
        &self,
        alg: &dyn HashAlgorithm,
        key: &str,
        count: usize,
    ) -> Result<Vec<Node>, LocatorError>;

    /// The most-preferred node for `key` (rank 0 of the preference list).
    fn get_primary_node(&self, alg: &dyn HashAlgorithm, key: &str) -> Result<Node, LocatorError>;
}

/// Callback fired by the node store after a successful membership change.
///
/// Locators react with a full ring rebuild; rebuild cost is
/// O(tokens · log tokens), acceptable because membership changes are rare.
pub trait NodeChangeListener: Send + Sync {
    fn set_active_nodes(&self, nodes: &[Node]);
}
