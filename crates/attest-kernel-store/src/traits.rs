//! StateStore trait: the abstract interface for kernel state persistence.
//!
//! Kernel state is a handful of key-value namespaces. This trait keeps the
//! kernel storage-agnostic; implementations include SQLite (primary) and
//! in-memory (for tests).

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, StoreError};

/// A key-value namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Module records of one integrity registry, keyed by registration index.
    Registry(String),
    /// Subject records, keyed by registration index.
    Subject,
    /// Executor delegations, keyed by subject id.
    Executor,
    /// Governance-whitelisted executors, keyed by address.
    ExecutorWhitelist,
    /// Access-control state (governance stage, default provider, pause flag).
    Governance,
    /// Per-resolver budget overrides, keyed by module id.
    ResolverBudget,
    /// Per-subject provider overrides, keyed by subject id.
    ProviderOverride,
    /// Emergency unlock history, keyed by sequence number.
    UnlockHistory,
    /// Miscellaneous kernel settings.
    Settings,
}

impl Namespace {
    pub fn registry(kind: impl Into<String>) -> Self {
        Namespace::Registry(kind.into())
    }

    /// Parse the textual form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(kind) = s.strip_prefix("registry/") {
            return (!kind.is_empty()).then(|| Namespace::Registry(kind.to_string()));
        }
        Some(match s {
            "subject" => Namespace::Subject,
            "executor" => Namespace::Executor,
            "executor_whitelist" => Namespace::ExecutorWhitelist,
            "governance" => Namespace::Governance,
            "resolver_budget" => Namespace::ResolverBudget,
            "provider_override" => Namespace::ProviderOverride,
            "unlock_history" => Namespace::UnlockHistory,
            "settings" => Namespace::Settings,
            _ => return None,
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Registry(kind) => write!(f, "registry/{}", kind),
            Namespace::Subject => f.write_str("subject"),
            Namespace::Executor => f.write_str("executor"),
            Namespace::ExecutorWhitelist => f.write_str("executor_whitelist"),
            Namespace::Governance => f.write_str("governance"),
            Namespace::ResolverBudget => f.write_str("resolver_budget"),
            Namespace::ProviderOverride => f.write_str("provider_override"),
            Namespace::UnlockHistory => f.write_str("unlock_history"),
            Namespace::Settings => f.write_str("settings"),
        }
    }
}

/// One write in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        namespace: Namespace,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        namespace: Namespace,
        key: Vec<u8>,
    },
    /// Remove every key in the namespace.
    Clear { namespace: Namespace },
}

/// A group of writes applied atomically, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, namespace: Namespace, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            namespace,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Encode `value` as CBOR and queue a put.
    pub fn put_value<T: Serialize>(
        &mut self,
        namespace: Namespace,
        key: impl Into<Vec<u8>>,
        value: &T,
    ) -> Result<&mut Self> {
        let value = encode(value)?;
        Ok(self.put(namespace, key, value))
    }

    pub fn delete(&mut self, namespace: Namespace, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            namespace,
            key: key.into(),
        });
        self
    }

    pub fn clear(&mut self, namespace: Namespace) -> &mut Self {
        self.ops.push(WriteOp::Clear { namespace });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The StateStore trait: async interface for kernel state persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite a value.
    async fn put(&self, namespace: &Namespace, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, namespace: &Namespace, key: &[u8]) -> Result<bool>;

    /// Every entry in a namespace, ordered by key bytes.
    async fn scan(&self, namespace: &Namespace) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Number of keys in a namespace.
    async fn count(&self, namespace: &Namespace) -> Result<usize>;

    /// Apply every write in `batch`, or none of them.
    async fn apply_batch(&self, batch: WriteBatch) -> Result<()>;
}

/// Typed CBOR helpers over any [`StateStore`].
pub trait StateStoreExt: StateStore {
    /// Get and decode a value.
    fn get_value<T: DeserializeOwned + Send>(
        &self,
        namespace: &Namespace,
        key: &[u8],
    ) -> impl Future<Output = Result<Option<T>>> + Send;

    /// Encode and store a value.
    fn put_value<T: Serialize + Sync>(
        &self,
        namespace: &Namespace,
        key: &[u8],
        value: &T,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Decode every value in a namespace, in key order.
    fn scan_values<T: DeserializeOwned + Send>(
        &self,
        namespace: &Namespace,
    ) -> impl Future<Output = Result<Vec<(Vec<u8>, T)>>> + Send;
}

impl<S: StateStore + ?Sized> StateStoreExt for S {
    async fn get_value<T: DeserializeOwned + Send>(
        &self,
        namespace: &Namespace,
        key: &[u8],
    ) -> Result<Option<T>> {
        match self.get(namespace, key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_value<T: Serialize + Sync>(
        &self,
        namespace: &Namespace,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let bytes = encode(value)?;
        self.put(namespace, key, &bytes).await
    }

    async fn scan_values<T: DeserializeOwned + Send>(
        &self,
        namespace: &Namespace,
    ) -> Result<Vec<(Vec<u8>, T)>> {
        self.scan(namespace)
            .await?
            .into_iter()
            .map(|(key, bytes)| -> Result<(Vec<u8>, T)> { Ok((key, decode(&bytes)?)) })
            .collect()
    }
}

/// Encode a value as CBOR.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_text_roundtrip() {
        let all = [
            Namespace::registry("provider"),
            Namespace::Subject,
            Namespace::Executor,
            Namespace::ExecutorWhitelist,
            Namespace::Governance,
            Namespace::ResolverBudget,
            Namespace::ProviderOverride,
            Namespace::UnlockHistory,
            Namespace::Settings,
        ];
        for ns in all {
            assert_eq!(Namespace::parse(&ns.to_string()), Some(ns));
        }
        assert_eq!(Namespace::parse("registry/"), None);
        assert_eq!(Namespace::parse("nope"), None);
    }

    #[test]
    fn test_batch_builder() {
        let mut batch = WriteBatch::new();
        batch
            .clear(Namespace::Subject)
            .put(Namespace::Subject, vec![1], vec![2])
            .delete(Namespace::Executor, vec![3]);
        batch.put_value(Namespace::Settings, b"n".to_vec(), &42u64).unwrap();

        assert_eq!(batch.len(), 4);
        assert!(matches!(batch.ops()[0], WriteOp::Clear { .. }));
    }
}
