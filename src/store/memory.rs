//! In-memory store with per-entry TTL.
//! Expiry is measured on the tokio clock, so paused-time tests can step past it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{pending_lookup, PendingWrite, Store, StoreError, Transaction};

type EntryKey = (String, Vec<u8>);

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<EntryKey, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries across all namespaces.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            entries: Arc::clone(&self.entries),
            pending: Vec::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    entries: Arc<RwLock<HashMap<EntryKey, Entry>>>,
    pending: Vec<PendingWrite<Instant>>,
}

impl MemoryTransaction {
    fn buffer(&mut self, namespace: &str, key: &[u8], value: Vec<u8>, expires_at: Option<Instant>) {
        self.pending.push(PendingWrite {
            namespace: namespace.to_string(),
            key: key.to_vec(),
            value,
            expires_at,
        });
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        if let Some(write) = pending_lookup(&self.pending, namespace, key) {
            let live = write.expires_at.map_or(true, |at| now < at);
            return Ok(live.then(|| write.value.clone()));
        }

        let entries = self.entries.read();
        Ok(entries
            .get(&(namespace.to_string(), key.to_vec()))
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn insert(
        &mut self,
        namespace: &str,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.buffer(namespace, key, value, None);
        Ok(())
    }

    async fn insert_with_ttl(
        &mut self,
        namespace: &str,
        key: &[u8],
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        // A TTL past the clock's range never expires, same as the SQLite store.
        let expires_at = Instant::now().checked_add(ttl);
        self.buffer(namespace, key, value, expires_at);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { entries, pending } = *self;
        if pending.is_empty() {
            return Ok(());
        }
        let count = pending.len();
        let mut entries = entries.write();
        for write in pending {
            entries.insert(
                (write.namespace, write.key),
                Entry {
                    value: write.value,
                    expires_at: write.expires_at,
                },
            );
        }
        debug!(writes = count, "memory store commit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "test";

    #[tokio::test]
    async fn committed_write_is_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert(NS, b"key1", b"value1".to_vec()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(NS, b"key1").await.unwrap(), Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(NS, b"key1", b"value1".to_vec()).await.unwrap();
            assert_eq!(tx.get(NS, b"key1").await.unwrap(), Some(b"value1".to_vec()));
        }

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(NS, b"key1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn uncommitted_writes_are_isolated() {
        let store = MemoryStore::new();
        let mut writer = store.begin().await.unwrap();
        let mut reader = store.begin().await.unwrap();

        writer.insert(NS, b"k", b"v".to_vec()).await.unwrap();
        assert_eq!(reader.get(NS, b"k").await.unwrap(), None);

        writer.commit().await.unwrap();
        assert_eq!(reader.get(NS, b"k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn namespaces_are_separate() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert("a", b"k", b"1".to_vec()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get("b", b"k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiration() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_with_ttl(NS, b"k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(NS, b"k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(tx.get(NS, b"k").await.unwrap(), None);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_ttl_never_expires() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_with_ttl(NS, b"k", b"v".to_vec(), Duration::MAX)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        tokio::time::advance(Duration::from_secs(10 * 365 * 86_400)).await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(NS, b"k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_replaces_value_and_ttl() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_with_ttl(NS, b"k", b"old".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_with_ttl(NS, b"k", b"new".to_vec(), Duration::from_secs(100))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(NS, b"k").await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.len(), 1);
    }
}
