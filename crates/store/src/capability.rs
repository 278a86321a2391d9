//! The narrow capability every backend exposes to the core.
//!
//! The coordinator depends only on this trait, never on a specific backend:
//! embedded stores, remote caches and protocol clients all sit behind the
//! same four methods. Decorators (caching, rate limiting) compose by holding
//! a reference to the wrapped capability rather than extending a base type.

use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend operation failed: {0}")]
    Failed(String),
}

/// Uniform get/set/delete/exists surface of one store endpoint.
#[async_trait::async_trait]
pub trait StoreCapability: Send + Sync + 'static {
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;
    async fn set(&self, key: &str, value: Bytes) -> Result<(), BackendError>;
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// In-process backend: a plain map behind an async lock.
///
/// The reference backend for tests and single-process clusters.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StoreCapability for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), BackendError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
