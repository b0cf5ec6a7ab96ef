//! Durable store backed by SQLite.
//! Expiry is stored as a unix-millisecond deadline; expired rows are never
//! returned and are purged on open and via `purge_expired`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{pending_lookup, PendingWrite, Store, StoreError, Transaction};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::init(conn)?;
        info!(path = %db_path.display(), "SQLite store opened");
        Ok(store)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key BLOB NOT NULL,
                value BLOB NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (namespace, key)
            );
            CREATE INDEX IF NOT EXISTS idx_kv_expires
                ON kv(expires_at);",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.purge_expired()?;
        Ok(store)
    }

    /// Remove expired rows. Returns how many were deleted.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_unix_ms()],
        )?;
        if count > 0 {
            info!(removed = count, "SQLite store cleanup");
        }
        Ok(count)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            pending: Vec::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

struct SqliteTransaction {
    conn: Arc<Mutex<Connection>>,
    pending: Vec<PendingWrite<i64>>,
}

impl SqliteTransaction {
    fn buffer(&mut self, namespace: &str, key: &[u8], value: Vec<u8>, expires_at: Option<i64>) {
        self.pending.push(PendingWrite {
            namespace: namespace.to_string(),
            key: key.to_vec(),
            value,
            expires_at,
        });
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn get(&mut self, namespace: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let now = now_unix_ms();
        if let Some(write) = pending_lookup(&self.pending, namespace, key) {
            let live = write.expires_at.map_or(true, |at| now < at);
            return Ok(live.then(|| write.value.clone()));
        }

        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv
                 WHERE namespace = ?1 AND key = ?2
                   AND (expires_at IS NULL OR expires_at > ?3)",
                params![namespace, key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
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
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.buffer(namespace, key, value, Some(now_unix_ms().saturating_add(ttl_ms)));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let SqliteTransaction { conn, pending } = *self;
        if pending.is_empty() {
            return Ok(());
        }

        let mut conn = conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO kv (namespace, key, value, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for write in &pending {
                stmt.execute(params![
                    write.namespace,
                    write.key,
                    write.value,
                    write.expires_at
                ])?;
            }
        }
        tx.commit()?;
        debug!(writes = pending.len(), "SQLite store commit");
        Ok(())
    }
}

/// Current time as Unix timestamp (milliseconds).
fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
