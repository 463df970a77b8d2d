//! # Local Store Seam
//!
//! The sync engine only needs three operations from durable storage:
//! read, write and remove a JSON value by logical key. This trait is the
//! seam between the engine and whatever holds the bytes.
//!
//! ```text
//!   SyncEngine ──► LocalStore ──┬──► KvRepository (SQLite, production)
//!                               └──► MemoryStore  (tests)
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::DbResult;

/// Durable key-value storage. Values are JSON text.
///
/// A `set` that returns `Ok` must survive a process restart.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns the stored value, or `None` if the key was never written.
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    /// Writes (or replaces) the value under `key`.
    async fn set(&self, key: &str, value: &str) -> DbResult<()>;

    /// Deletes the key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> DbResult<()>;
}

/// Process-local store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
