//! Typed units of work executed against a single replica.

use crate::capability::StoreCapability;
use bytes::Bytes;
use quorumkv_common::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Get,
    Set,
    Delete,
}

/// One logical get/set/delete bound to a key and a target node.
///
/// Cloning is cheap (`Bytes` values), so the same logical write can be
/// retargeted at every replica in a preference list.
#[derive(Debug, Clone)]
pub struct Operation {
    pub key: String,
    pub value: Option<Bytes>,
    pub kind: OperationKind,
    pub node: Node,
}

impl Operation {
    pub fn get(key: impl Into<String>, node: Node) -> Self {
        Self {
            key: key.into(),
            value: None,
            kind: OperationKind::Get,
            node,
        }
    }

    pub fn set(key: impl Into<String>, value: Bytes, node: Node) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            kind: OperationKind::Set,
            node,
        }
    }

    pub fn delete(key: impl Into<String>, node: Node) -> Self {
        Self {
            key: key.into(),
            value: None,
            kind: OperationKind::Delete,
            node,
        }
    }

    /// The same logical operation aimed at a different replica.
    pub fn retarget(&self, node: Node) -> Self {
        Self {
            node,
            ..self.clone()
        }
    }

    /// Run this operation against the given capability.
    ///
    /// Never fails: backend errors are folded into an `Error`-status result
    /// so that exactly one [`OperationResult`] exists per executed operation.
    pub async fn execute(&self, capability: &dyn StoreCapability) -> OperationResult {
        match self.kind {
            OperationKind::Get => match capability.get(&self.key).await {
                Ok(Some(value)) => OperationResult::success(self.node.clone(), Some(value)),
                Ok(None) => OperationResult::null(self.node.clone()),
                Err(e) => OperationResult::error(self.node.clone(), e.to_string()),
            },
            OperationKind::Set => match &self.value {
                Some(value) => match capability.set(&self.key, value.clone()).await {
                    Ok(()) => OperationResult::success(self.node.clone(), None),
                    Err(e) => OperationResult::error(self.node.clone(), e.to_string()),
                },
                None => OperationResult::error(
                    self.node.clone(),
                    "set operation submitted without a value".to_string(),
                ),
            },
            OperationKind::Delete => match capability.delete(&self.key).await {
                Ok(()) => OperationResult::success(self.node.clone(), None),
                Err(e) => OperationResult::error(self.node.clone(), e.to_string()),
            },
        }
    }
}

/// Closed outcome classification, consumed exhaustively by the context
/// filter and the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The replica executed the operation (a get found a value).
    Success,
    /// The replica responded but holds no value for the key.
    NullValue,
    /// The replica failed to execute the operation.
    Error,
}

/// Produced exactly once per executed [`Operation`].
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub node: Node,
    pub status: OperationStatus,
    pub value: Option<Bytes>,
    pub error: Option<String>,
}

impl OperationResult {
    pub fn success(node: Node, value: Option<Bytes>) -> Self {
        Self {
            node,
            status: OperationStatus::Success,
            value,
            error: None,
        }
    }

    pub fn null(node: Node) -> Self {
        Self {
            node,
            status: OperationStatus::NullValue,
            value: None,
            error: None,
        }
    }

    pub fn error(node: Node, message: String) -> Self {
        Self {
            node,
            status: OperationStatus::Error,
            value: None,
            error: Some(message),
        }
    }

    /// Whether the replica responded at all (success or a null value).
    pub fn is_response(&self) -> bool {
        self.status != OperationStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BackendError, MemoryStore};

    fn node(id: u32) -> Node {
        Node::new(id, id, format!("salt:{}", id), format!("uri://host{}", id))
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl StoreCapability for BrokenStore {
        async fn exists(&self, _key: &str) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("down".into()))
        }
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, BackendError> {
            Err(BackendError::Unavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: Bytes) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_get_against_empty_store_is_null() {
        let store = MemoryStore::new();
        let result = Operation::get("missing", node(1)).execute(&store).await;
        assert_eq!(result.status, OperationStatus::NullValue);
        assert!(result.is_response());
        assert_eq!(result.value, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        let set = Operation::set("k", Bytes::from_static(b"v"), node(1));
        assert_eq!(store_result(&set, &store).await, OperationStatus::Success);

        let get = Operation::get("k", node(1));
        let result = get.execute(&store).await;
        assert_eq!(result.status, OperationStatus::Success);
        assert_eq!(result.value, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        Operation::set("k", Bytes::from_static(b"v"), node(1))
            .execute(&store)
            .await;
        let result = Operation::delete("k", node(1)).execute(&store).await;
        assert_eq!(result.status, OperationStatus::Success);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_failure_folds_into_error_status() {
        let result = Operation::get("k", node(1)).execute(&BrokenStore).await;
        assert_eq!(result.status, OperationStatus::Error);
        assert!(!result.is_response());
        assert!(result.error.unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_set_without_value_is_error() {
        let store = MemoryStore::new();
        let mut op = Operation::set("k", Bytes::new(), node(1));
        op.value = None;
        let result = op.execute(&store).await;
        assert_eq!(result.status, OperationStatus::Error);
    }

    #[test]
    fn test_retarget_preserves_payload() {
        let op = Operation::set("k", Bytes::from_static(b"v"), node(1));
        let copy = op.retarget(node(2));
        assert_eq!(copy.key, "k");
        assert_eq!(copy.value, op.value);
        assert_eq!(copy.kind, OperationKind::Set);
        assert_eq!(copy.node.id, 2);
    }

    async fn store_result(op: &Operation, store: &MemoryStore) -> OperationStatus {
        op.execute(store).await.status
    }
}
