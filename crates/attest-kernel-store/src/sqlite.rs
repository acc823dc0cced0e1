//! SQLite implementation of the StateStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use attest_kernel_core::{Clock, SystemClock};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Namespace, StateStore, WriteBatch, WriteOp};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("connection mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let namespace = namespace.to_string();
        let key = key.to_vec();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?)
        })
        .await
    }

    async fn put(&self, namespace: &Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        let namespace = namespace.to_string();
        let key = key.to_vec();
        let value = value.to_vec();
        self.run(move |conn| {
            upsert(conn, &namespace, &key, &value, SystemClock.now_millis())?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &Namespace, key: &[u8]) -> Result<bool> {
        let namespace = namespace.to_string();
        let key = key.to_vec();
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn scan(&self, namespace: &Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let namespace = namespace.to_string();
        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM kv WHERE namespace = ?1 ORDER BY key")?;
            let rows = stmt
                .query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<(Vec<u8>, Vec<u8>)>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn count(&self, namespace: &Namespace) -> Result<usize> {
        let namespace = namespace.to_string();
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM kv WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )?;
            usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("row count {}", count)))
        })
        .await
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.run(move |conn| {
            let now = SystemClock.now_millis();
            let tx = conn.transaction()?;
            for op in batch.into_ops() {
                match op {
                    WriteOp::Put {
                        namespace,
                        key,
                        value,
                    } => upsert(&tx, &namespace.to_string(), &key, &value, now)?,
                    WriteOp::Delete { namespace, key } => {
                        tx.execute(
                            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                            params![namespace.to_string(), key],
                        )?;
                    }
                    WriteOp::Clear { namespace } => {
                        tx.execute(
                            "DELETE FROM kv WHERE namespace = ?1",
                            params![namespace.to_string()],
                        )?;
                    }
                }
            }
            // Dropping the transaction without commit rolls everything back.
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn upsert(conn: &Connection, namespace: &str, key: &[u8], value: &[u8], now: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![namespace, key, value, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StateStoreExt;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = SqliteStore::open_memory().unwrap();
        let ns = Namespace::Governance;

        store.put(&ns, b"state", b"v1").await.unwrap();
        store.put(&ns, b"state", b"v2").await.unwrap();
        assert_eq!(store.get(&ns, b"state").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.count(&ns).await.unwrap(), 1);
        assert_eq!(store.get(&Namespace::Settings, b"state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_orders_by_key() {
        let store = SqliteStore::open_memory().unwrap();
        let ns = Namespace::registry("resolver");
        for i in [2u64, 0, 1] {
            store.put(&ns, &i.to_be_bytes(), &[i as u8]).await.unwrap();
        }
        let keys: Vec<Vec<u8>> = store.scan(&ns).await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![0u64.to_be_bytes().to_vec(), 1u64.to_be_bytes().to_vec(), 2u64.to_be_bytes().to_vec()]
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(&Namespace::Executor, b"k", b"v").await.unwrap();
        assert!(store.delete(&Namespace::Executor, b"k").await.unwrap());
        assert!(!store.delete(&Namespace::Executor, b"k").await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let store = SqliteStore::open_memory().unwrap();
        let ns = Namespace::Subject;
        store.put(&ns, b"keep", b"1").await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .clear(ns.clone())
            .put(ns.clone(), b"a".to_vec(), b"2".to_vec())
            .put(ns.clone(), b"b".to_vec(), b"3".to_vec());
        store.apply_batch(batch).await.unwrap();

        assert_eq!(store.get(&ns, b"keep").await.unwrap(), None);
        assert_eq!(store.count(&ns).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put_value(&Namespace::Settings, b"answer", &42u32)
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let answer: Option<u32> = store.get_value(&Namespace::Settings, b"answer").await.unwrap();
        assert_eq!(answer, Some(42));
    }
}
