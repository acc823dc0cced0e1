//! Module hosts: where pluggable code lives.
//!
//! A [`ModuleHost`] answers two questions about an address: what is the
//! fingerprint of the code deployed there right now, and give me a handle to
//! it. On a blockchain host the fingerprint is the code hash; for native
//! plugins it is the hash of the loaded artifact.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use attest_kernel_core::{Address, Blake3Hash, Fingerprint};
use bytes::Bytes;

/// Resolves module references to deployed code.
pub trait ModuleHost<M: ?Sized>: Send + Sync {
    /// Fingerprint of the code currently deployed at `reference`.
    ///
    /// `None` means nothing is deployed there (a plain identity, not a module).
    fn fingerprint(&self, reference: &Address) -> Option<Fingerprint>;

    /// Handle to the module currently deployed at `reference`.
    fn load(&self, reference: &Address) -> Option<Arc<M>>;

    fn is_module(&self, reference: &Address) -> bool {
        self.fingerprint(reference).is_some()
    }
}

/// In-memory module host.
///
/// Deploying over an existing address replaces the code in place, which is
/// exactly the silent retarget the registries guard against.
pub struct CodeTable<M: ?Sized> {
    entries: RwLock<HashMap<Address, Deployed<M>>>,
}

struct Deployed<M: ?Sized> {
    code: Bytes,
    fingerprint: Fingerprint,
    instance: Arc<M>,
}

impl<M: ?Sized> CodeTable<M> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Deploy `code` backed by `instance` at `reference`, returning its fingerprint.
    pub fn deploy(&self, reference: Address, code: impl Into<Bytes>, instance: Arc<M>) -> Fingerprint {
        let code = code.into();
        let fingerprint = Blake3Hash::hash(&code);
        self.write().insert(
            reference,
            Deployed {
                code,
                fingerprint,
                instance,
            },
        );
        fingerprint
    }

    /// Change the code at `reference` while keeping the same instance.
    ///
    /// Returns the new fingerprint, or `None` if nothing is deployed there.
    pub fn patch_code(&self, reference: &Address, code: impl Into<Bytes>) -> Option<Fingerprint> {
        let mut entries = self.write();
        let entry = entries.get_mut(reference)?;
        entry.code = code.into();
        entry.fingerprint = Blake3Hash::hash(&entry.code);
        Some(entry.fingerprint)
    }

    /// Remove whatever is deployed at `reference`.
    pub fn remove(&self, reference: &Address) -> bool {
        self.write().remove(reference).is_some()
    }

    /// The raw code deployed at `reference`.
    pub fn code(&self, reference: &Address) -> Option<Bytes> {
        self.read().get(reference).map(|d| d.code.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Address, Deployed<M>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Address, Deployed<M>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<M: ?Sized> Default for CodeTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized + Send + Sync> ModuleHost<M> for CodeTable<M> {
    fn fingerprint(&self, reference: &Address) -> Option<Fingerprint> {
        self.read().get(reference).map(|d| d.fingerprint)
    }

    fn load(&self, reference: &Address) -> Option<Arc<M>> {
        self.read().get(reference).map(|d| Arc::clone(&d.instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct A;
    impl Named for A {
        fn name(&self) -> &'static str {
            "a"
        }
    }

    #[test]
    fn test_deploy_and_load() {
        let table: CodeTable<dyn Named> = CodeTable::new();
        let reference = Address::derive("a");
        assert!(!table.is_module(&reference));

        let fp = table.deploy(reference, b"code-a".to_vec(), Arc::new(A));
        assert_eq!(table.fingerprint(&reference), Some(fp));
        assert_eq!(table.load(&reference).unwrap().name(), "a");
        assert_eq!(fp, Blake3Hash::hash(b"code-a"));
    }

    #[test]
    fn test_patch_changes_fingerprint() {
        let table: CodeTable<dyn Named> = CodeTable::new();
        let reference = Address::derive("a");
        let before = table.deploy(reference, b"v1".to_vec(), Arc::new(A));

        let after = table.patch_code(&reference, b"v2".to_vec()).unwrap();
        assert_ne!(before, after);
        assert!(table.patch_code(&Address::derive("missing"), b"v".to_vec()).is_none());
    }

    #[test]
    fn test_remove() {
        let table: CodeTable<dyn Named> = CodeTable::new();
        let reference = Address::derive("a");
        table.deploy(reference, b"v1".to_vec(), Arc::new(A));
        assert!(table.remove(&reference));
        assert!(table.load(&reference).is_none());
        assert!(table.is_empty());
    }
}
