//! Consistent-hash node location for quorumkv.
//!
//! Provides: the [`HashRing`] leaf structure, the [`NodeLocator`] contract
//! that turns a key into an ordered replica preference list, and two
//! interchangeable strategies: [`DynamoNodeLocator`] (outer-ring token
//! assignment, strategy 3 from the Dynamo paper) and [`KetamaNodeLocator`]
//! (direct per-node virtual positions).

pub mod dynamo;
pub mod ketama;
pub mod locator;
pub mod ring;

pub use dynamo::DynamoNodeLocator;
pub use ketama::KetamaNodeLocator;
pub use locator::{LocatorError, NodeChangeListener, NodeLocator};
pub use ring::{HashRing, Token};
