//! Node membership for quorumkv.
//!
//! The [`NodeStore`] owns the canonical active-node list, delegates durable
//! membership to a [`NodePersistence`] hook, tracks rolling per-node error
//! counts, and evicts nodes that misbehave. Every membership change is pushed
//! synchronously to registered [`NodeChangeListener`]s (the locators), so
//! ring rebuilds happen with the refresh, never lazily.

pub mod node_store;
pub mod persistence;

pub use node_store::NodeStore;
pub use persistence::{NodePersistence, PersistenceError, StaticNodePersistence};
