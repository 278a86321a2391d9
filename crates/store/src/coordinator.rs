//! The client-facing quorum coordinator.

use crate::context::{Context, NodeRankContextFilter};
use crate::operation::{Operation, OperationResult, OperationStatus};
use crate::queue::OperationQueue;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use quorumkv_cluster::NodeStore;
use quorumkv_common::{HashAlgorithm, Node};
use quorumkv_config::ClusterConfig;
use quorumkv_ring::{LocatorError, NodeLocator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error(
        "quorum not reached for {operation} on {key:?}: needed {needed}, got {received} \
         (succeeded nodes {succeeded:?}, failed nodes {failed:?})"
    )]
    QuorumUnavailable {
        operation: &'static str,
        key: String,
        needed: usize,
        received: usize,
        succeeded: Vec<u32>,
        failed: Vec<u32>,
    },
}

/// One logical key-value store spanning many replicas.
///
/// Every call fans out over the key's preference list through the bounded
/// queue and waits for the configured quorum, never for every replica. Read
/// replies are reconciled by node rank and stale replicas repaired in the
/// background; replica failures feed the node store's eviction counters.
pub struct DistributedStore {
    config: ClusterConfig,
    hasher: Arc<dyn HashAlgorithm>,
    locator: Arc<dyn NodeLocator>,
    node_store: Arc<NodeStore>,
    queue: Arc<OperationQueue>,
    filter: NodeRankContextFilter,
}

/// Replies gathered for one client call before the deadline.
///
/// `succeeded` holds the nodes whose reply counts toward the quorum: for
/// reads that includes "no value here" replies, for writes only acks.
/// Error replies still land in `contexts` so reconciliation can repair them.
struct Gathered {
    contexts: Vec<Context>,
    succeeded: Vec<u32>,
    failed: Vec<u32>,
}

impl DistributedStore {
    pub fn new(
        config: ClusterConfig,
        hasher: Arc<dyn HashAlgorithm>,
        locator: Arc<dyn NodeLocator>,
        node_store: Arc<NodeStore>,
        queue: Arc<OperationQueue>,
    ) -> Self {
        let filter = NodeRankContextFilter::from_config(&config);
        Self {
            config,
            hasher,
            locator,
            node_store,
            queue,
            filter,
        }
    }

    /// Read a key at the configured read quorum.
    ///
    /// `Ok(None)` means the quorum responded and no replica holds a value.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let _timer = quorumkv_metrics::start_op_timer("get");
        quorumkv_metrics::metrics().gets.inc();

        let nodes = self.preference_list(key)?;
        let ops = nodes
            .iter()
            .map(|n| Operation::get(key, n.clone()))
            .collect();

        let gathered = self
            .gather(key, ops, &nodes, self.config.required_reads, self.config.read_timeout())
            .await;

        if gathered.succeeded.len() < self.config.required_reads {
            return Err(self.quorum_miss("get", key, self.config.required_reads, gathered));
        }

        match self.filter.filter(gathered.contexts) {
            Some(reconciled) => {
                self.submit_repairs(reconciled.repairs);
                Ok(reconciled.value)
            }
            None => Ok(None),
        }
    }

    /// Whether a read quorum sees a value for `key`.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Read many keys; absent keys are simply missing from the result map.
    pub async fn get_bulk<I, S>(&self, keys: I) -> Result<HashMap<String, Bytes>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        for key in keys {
            let key = key.as_ref();
            if let Some(value) = self.get(key).await? {
                values.insert(key.to_string(), value);
            }
        }
        Ok(values)
    }

    /// Write a key at the configured write quorum.
    pub async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let _timer = quorumkv_metrics::start_op_timer("set");
        quorumkv_metrics::metrics().sets.inc();

        let nodes = self.preference_list(key)?;
        let ops = nodes
            .iter()
            .map(|n| Operation::set(key, value.clone(), n.clone()))
            .collect();
        self.write_quorum("set", key, ops, &nodes).await
    }

    /// Delete a key at the configured write quorum.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _timer = quorumkv_metrics::start_op_timer("delete");
        quorumkv_metrics::metrics().deletes.inc();

        let nodes = self.preference_list(key)?;
        let ops = nodes
            .iter()
            .map(|n| Operation::delete(key, n.clone()))
            .collect();
        self.write_quorum("delete", key, ops, &nodes).await
    }

    /// Operations currently in flight on the shared queue.
    pub fn queue_size(&self) -> usize {
        self.queue.queue_size()
    }

    fn preference_list(&self, key: &str) -> Result<Vec<Node>, LocatorError> {
        // Degraded clusters get a shorter list instead of an error; quorum
        // accounting still runs against the configured r and w.
        let count = self
            .config
            .replicas
            .min(self.node_store.active_node_count());
        self.locator
            .get_preference_list(self.hasher.as_ref(), key, count)
    }

    async fn write_quorum(
        &self,
        operation: &'static str,
        key: &str,
        ops: Vec<Operation>,
        nodes: &[Node],
    ) -> Result<(), StoreError> {
        let needed = self.config.required_writes;
        let gathered = self
            .gather(key, ops, nodes, needed, self.config.write_timeout())
            .await;

        if gathered.succeeded.len() < needed {
            return Err(self.quorum_miss(operation, key, needed, gathered));
        }
        Ok(())
    }

    /// Fan `ops` out and collect replies until `needed` are in, the deadline
    /// passes, or too few replicas remain to possibly reach the quorum.
    async fn gather(
        &self,
        key: &str,
        ops: Vec<Operation>,
        nodes: &[Node],
        needed: usize,
        timeout: Duration,
    ) -> Gathered {
        let deadline = Instant::now() + timeout;
        let mut pending = FuturesUnordered::new();
        let mut gathered = Gathered {
            contexts: Vec::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for (rank, op) in ops.into_iter().enumerate() {
            let node = op.node.clone();
            match self.queue.submit(op) {
                Ok(handle) => {
                    pending.push(async move { (rank, handle.wait().await) });
                }
                Err(e) => {
                    // Backpressure counts against the node like any failure.
                    tracing::debug!(node = %node, key, "submission rejected: {}", e);
                    self.node_store.record_error(&node);
                    gathered.failed.push(node.id);
                }
            }
        }

        loop {
            let counted = gathered.succeeded.len();
            if counted >= needed {
                break;
            }
            if counted + pending.len() < needed {
                // Fail fast: outstanding replies can no longer reach quorum.
                break;
            }

            let reply = match timeout_at(deadline, pending.next()).await {
                Ok(Some(reply)) => reply,
                // Deadline passed or nothing left in flight. Timed-out
                // replicas are slow, not failed, so no error is recorded.
                Ok(None) | Err(_) => break,
            };

            match reply {
                (rank, Some(result)) => self.account(key, rank, result, &mut gathered),
                (rank, None) => {
                    if let Some(node) = nodes.get(rank) {
                        self.node_store.record_error(node);
                        gathered.failed.push(node.id);
                    }
                }
            }
        }

        // Dropping `pending` abandons the remaining waits; the queue tasks
        // run to completion on their own.
        gathered
    }

    fn account(&self, key: &str, rank: usize, result: OperationResult, gathered: &mut Gathered) {
        match result.status {
            OperationStatus::Error => {
                tracing::debug!(node = %result.node, key, "replica error: {:?}", result.error);
                self.node_store.record_error(&result.node);
                gathered.failed.push(result.node.id);
                gathered.contexts.push(Context::from_result(key, rank, result));
            }
            OperationStatus::Success | OperationStatus::NullValue => {
                gathered.succeeded.push(result.node.id);
                gathered.contexts.push(Context::from_result(key, rank, result));
            }
        }
    }

    fn quorum_miss(
        &self,
        operation: &'static str,
        key: &str,
        needed: usize,
        gathered: Gathered,
    ) -> StoreError {
        quorumkv_metrics::metrics().quorum_failures.inc();
        let received = gathered.succeeded.len();
        tracing::warn!(key, operation, needed, received, "quorum not reached");
        StoreError::QuorumUnavailable {
            operation,
            key: key.to_string(),
            needed,
            received,
            succeeded: gathered.succeeded,
            failed: gathered.failed,
        }
    }

    fn submit_repairs(&self, repairs: Vec<Operation>) {
        for op in repairs {
            let node = op.node.clone();
            match self.queue.submit(op) {
                Ok(handle) => {
                    quorumkv_metrics::metrics().read_repairs.inc();
                    drop(handle);
                }
                Err(e) => {
                    // Repairs are opportunistic; backpressure just skips them.
                    tracing::debug!(node = %node, "read repair skipped: {}", e);
                }
            }
        }
    }
}

impl std::fmt::Debug for DistributedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedStore")
            .field("required_reads", &self.config.required_reads)
            .field("required_writes", &self.config.required_writes)
            .field("replicas", &self.config.replicas)
            .finish_non_exhaustive()
    }
}
