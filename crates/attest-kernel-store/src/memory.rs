//! In-memory implementation of the StateStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::{Namespace, StateStore, WriteBatch, WriteOp};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Namespace, Table>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys across all namespaces.
    pub fn total_keys(&self) -> usize {
        self.read().values().map(BTreeMap::len).sum()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Namespace, Table>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Namespace, Table>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()
            .get(namespace)
            .and_then(|table| table.get(key))
            .cloned())
    }

    async fn put(&self, namespace: &Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()
            .entry(namespace.clone())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, key: &[u8]) -> Result<bool> {
        Ok(self
            .write()
            .get_mut(namespace)
            .map(|table| table.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn scan(&self, namespace: &Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .read()
            .get(namespace)
            .map(|table| table.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn count(&self, namespace: &Namespace) -> Result<usize> {
        Ok(self.read().get(namespace).map(BTreeMap::len).unwrap_or(0))
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<()> {
        // Every op is infallible, so holding the write lock makes the batch atomic.
        let mut inner = self.write();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    inner.entry(namespace).or_default().insert(key, value);
                }
                WriteOp::Delete { namespace, key } => {
                    if let Some(table) = inner.get_mut(&namespace) {
                        table.remove(&key);
                    }
                }
                WriteOp::Clear { namespace } => {
                    inner.remove(&namespace);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StateStoreExt;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        let ns = Namespace::Subject;

        assert_eq!(store.get(&ns, b"a").await.unwrap(), None);
        store.put(&ns, b"a", b"1").await.unwrap();
        assert_eq!(store.get(&ns, b"a").await.unwrap(), Some(b"1".to_vec()));
        // Namespaces are isolated.
        assert_eq!(store.get(&Namespace::Executor, b"a").await.unwrap(), None);

        assert!(store.delete(&ns, b"a").await.unwrap());
        assert!(!store.delete(&ns, b"a").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_is_key_ordered() {
        let store = MemoryStore::new();
        let ns = Namespace::registry("provider");
        for key in [3u64, 1, 2] {
            store.put(&ns, &key.to_be_bytes(), &[key as u8]).await.unwrap();
        }
        let values: Vec<u8> = store
            .scan(&ns)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, v)| v[0])
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(store.count(&ns).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_batch_clear_then_put() {
        let store = MemoryStore::new();
        let ns = Namespace::Subject;
        store.put(&ns, b"stale", b"x").await.unwrap();

        let mut batch = WriteBatch::new();
        batch.clear(ns.clone()).put(ns.clone(), b"fresh".to_vec(), b"y".to_vec());
        store.apply_batch(batch).await.unwrap();

        assert_eq!(store.get(&ns, b"stale").await.unwrap(), None);
        assert_eq!(store.get(&ns, b"fresh").await.unwrap(), Some(b"y".to_vec()));
        assert_eq!(store.total_keys(), 1);
    }

    #[tokio::test]
    async fn test_typed_values() {
        let store = MemoryStore::new();
        store
            .put_value(&Namespace::Settings, b"budget", &(7u64, "seven".to_string()))
            .await
            .unwrap();
        let value: Option<(u64, String)> = store
            .get_value(&Namespace::Settings, b"budget")
            .await
            .unwrap();
        assert_eq!(value, Some((7, "seven".to_string())));

        store.put(&Namespace::Settings, b"junk", &[0xff]).await.unwrap();
        let err = store
            .get_value::<(u64, String)>(&Namespace::Settings, b"junk")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::StoreError::Serialization(_)));
    }
}
