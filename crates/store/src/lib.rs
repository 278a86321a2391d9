//! The quorumkv distributed store.
//!
//! Composes the locator, membership and queue layers into a single logical
//! key-value store with tunable consistency: for each client call the
//! [`DistributedStore`] obtains a preference list, fans one operation per
//! replica out through the [`OperationQueue`], waits for the configured
//! quorum, reconciles divergent replies with the [`NodeRankContextFilter`],
//! and opportunistically repairs stale replicas on the read path.

pub mod capability;
pub mod connector;
pub mod context;
pub mod coordinator;
pub mod operation;
pub mod queue;

pub use capability::{BackendError, MemoryStore, StoreCapability};
pub use connector::{StaticConnector, StoreConnector};
pub use context::{Context, ContextFilterResult, NodeRankContextFilter};
pub use coordinator::{DistributedStore, StoreError};
pub use operation::{Operation, OperationKind, OperationResult, OperationStatus};
pub use queue::{OperationHandle, OperationQueue, QueueError};
