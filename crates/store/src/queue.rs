//! Bounded asynchronous dispatch of operations to replicas.
//!
//! Every replica-bound operation goes through one [`OperationQueue`]: a
//! semaphore caps the number of in-flight operations, and each accepted
//! submission runs on its own task so a slow replica never blocks the
//! others. Callers hold an [`OperationHandle`] and decide how long they are
//! willing to wait; an abandoned handle lets the task finish in the
//! background without anyone observing the result.

use crate::connector::StoreConnector;
use crate::operation::{Operation, OperationResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("operation queue full (capacity {0})")]
    Rejected(usize),
}

/// Backpressured executor for replica operations.
pub struct OperationQueue {
    connector: Arc<dyn StoreConnector>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl OperationQueue {
    pub fn new(connector: Arc<dyn StoreConnector>, capacity: usize) -> Self {
        Self {
            connector,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Dispatch an operation to its target node.
    ///
    /// Rejects immediately when all permits are taken; the caller treats a
    /// rejection like any other node error. On acceptance the operation runs
    /// on a spawned task and the returned handle resolves with its result.
    pub fn submit(&self, op: Operation) -> Result<OperationHandle, QueueError> {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                quorumkv_metrics::metrics().queue_rejections.inc();
                tracing::debug!(node = %op.node, key = %op.key, "queue full, rejecting operation");
                return Err(QueueError::Rejected(self.capacity));
            }
        };

        let (tx, rx) = oneshot::channel();
        let connector = Arc::clone(&self.connector);
        tokio::spawn(run_operation(op, connector, permit, tx));

        Ok(OperationHandle { rx })
    }

    /// Number of operations currently in flight.
    pub fn queue_size(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

async fn run_operation(
    op: Operation,
    connector: Arc<dyn StoreConnector>,
    permit: OwnedSemaphorePermit,
    tx: oneshot::Sender<OperationResult>,
) {
    let result = match connector.connect(&op.node) {
        Ok(capability) => op.execute(capability.as_ref()).await,
        Err(e) => OperationResult::error(op.node.clone(), e.to_string()),
    };
    drop(permit);
    // The caller may have given up waiting; that is fine.
    let _ = tx.send(result);
}

/// A claim on the eventual result of one submitted operation.
#[derive(Debug)]
pub struct OperationHandle {
    rx: oneshot::Receiver<OperationResult>,
}

impl OperationHandle {
    /// Wait for the operation to finish. `None` if the executing task was
    /// torn down before producing a result.
    pub async fn wait(self) -> Option<OperationResult> {
        self.rx.await.ok()
    }

    /// Wait at most `timeout`; `None` on timeout or a torn-down task.
    pub async fn wait_timeout(self, timeout: Duration) -> Option<OperationResult> {
        tokio::time::timeout(timeout, self.rx).await.ok()?.ok()
    }

    /// Non-blocking probe for a finished result.
    pub fn poll_now(&mut self) -> Option<OperationResult> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BackendError, MemoryStore, StoreCapability};
    use crate::connector::StaticConnector;
    use crate::operation::OperationStatus;
    use bytes::Bytes;
    use quorumkv_common::Node;

    fn node(id: u32) -> Node {
        Node::new(id, id, format!("salt:{}", id), format!("uri://host{}", id))
    }

    fn single_node_queue(capacity: usize) -> (Arc<MemoryStore>, OperationQueue) {
        let backend = Arc::new(MemoryStore::new());
        let connector = StaticConnector::new().with(1, backend.clone() as Arc<dyn StoreCapability>);
        (backend, OperationQueue::new(Arc::new(connector), capacity))
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let (backend, queue) = single_node_queue(8);

        let handle = queue
            .submit(Operation::set("k", Bytes::from_static(b"v"), node(1)))
            .unwrap();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.status, OperationStatus::Success);
        assert_eq!(backend.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_unknown_node_yields_error_result() {
        let (_backend, queue) = single_node_queue(8);

        let handle = queue.submit(Operation::get("k", node(42))).unwrap();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.status, OperationStatus::Error);
        assert_eq!(result.node.id, 42);
    }

    #[tokio::test]
    async fn test_rejects_when_full() {
        struct StallingStore;

        #[async_trait::async_trait]
        impl StoreCapability for StallingStore {
            async fn exists(&self, _key: &str) -> Result<bool, BackendError> {
                std::future::pending().await
            }
            async fn get(&self, _key: &str) -> Result<Option<Bytes>, BackendError> {
                std::future::pending().await
            }
            async fn set(&self, _key: &str, _value: Bytes) -> Result<(), BackendError> {
                std::future::pending().await
            }
            async fn delete(&self, _key: &str) -> Result<(), BackendError> {
                std::future::pending().await
            }
        }

        let connector = StaticConnector::new().with(1, Arc::new(StallingStore));
        let queue = OperationQueue::new(Arc::new(connector), 2);

        let _h1 = queue.submit(Operation::get("a", node(1))).unwrap();
        let _h2 = queue.submit(Operation::get("b", node(1))).unwrap();
        assert_eq!(queue.queue_size(), 2);

        assert!(matches!(
            queue.submit(Operation::get("c", node(1))),
            Err(QueueError::Rejected(2))
        ));
    }

    #[tokio::test]
    async fn test_permit_released_after_completion() {
        let (_backend, queue) = single_node_queue(1);

        let handle = queue.submit(Operation::get("k", node(1))).unwrap();
        handle.wait().await.unwrap();

        // The permit is back, so another submission succeeds.
        let handle = queue.submit(Operation::get("k", node(1))).unwrap();
        assert!(handle.wait().await.is_some());
    }

    #[tokio::test]
    async fn test_abandoned_handle_still_executes() {
        let (backend, queue) = single_node_queue(4);

        let handle = queue
            .submit(Operation::set("k", Bytes::from_static(b"v"), node(1)))
            .unwrap();
        drop(handle);

        // The spawned task keeps running without an observer.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_wait_timeout_on_stalled_operation() {
        struct StallingStore;

        #[async_trait::async_trait]
        impl StoreCapability for StallingStore {
            async fn exists(&self, _key: &str) -> Result<bool, BackendError> {
                std::future::pending().await
            }
            async fn get(&self, _key: &str) -> Result<Option<Bytes>, BackendError> {
                std::future::pending().await
            }
            async fn set(&self, _key: &str, _value: Bytes) -> Result<(), BackendError> {
                std::future::pending().await
            }
            async fn delete(&self, _key: &str) -> Result<(), BackendError> {
                std::future::pending().await
            }
        }

        let connector = StaticConnector::new().with(1, Arc::new(StallingStore));
        let queue = OperationQueue::new(Arc::new(connector), 4);

        let handle = queue.submit(Operation::get("k", node(1))).unwrap();
        assert!(handle.wait_timeout(Duration::from_millis(20)).await.is_none());
    }
}
