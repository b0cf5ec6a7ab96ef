//! Key-value store consumed by the cache core.
//!
//! Work happens inside a [`Transaction`]: writes are buffered and only become
//! visible to other transactions on [`Transaction::commit`]. Dropping a
//! transaction without committing discards its writes, so every early return
//! in the caller is a rollback.

mod memory;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Store backend trait.
///
/// Implementations must be safe to share across concurrent callers; all
/// isolation between transactions is the backend's responsibility.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
pub trait Transaction: Send {
    /// Read a live value. Expired entries read as `None`.
    async fn get(&mut self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value that never expires.
    async fn insert(&mut self, namespace: &str, key: &[u8], value: Vec<u8>)
        -> Result<(), StoreError>;

    /// Write a value that becomes unreadable once `ttl` has elapsed.
    async fn insert_with_ttl(
        &mut self,
        namespace: &str,
        key: &[u8],
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Apply all buffered writes atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A write held back until commit.
#[derive(Debug, Clone)]
struct PendingWrite<T> {
    namespace: String,
    key: Vec<u8>,
    value: Vec<u8>,
    expires_at: Option<T>,
}

/// Latest pending write for `(namespace, key)`, if the transaction made one.
fn pending_lookup<'a, T>(
    pending: &'a [PendingWrite<T>],
    namespace: &str,
    key: &[u8],
) -> Option<&'a PendingWrite<T>> {
    pending
        .iter()
        .rev()
        .find(|w| w.namespace == namespace && w.key == key)
}
