//! The integrity registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use attest_kernel_core::{
    Address, AuditEvent, AuditSink, Fingerprint, Governance, GovernanceWitness, ModuleId,
};

use crate::error::{RegistryError, Result};
use crate::host::ModuleHost;
use crate::record::{ModuleRecord, Page};

/// Largest page [`IntegrityRegistry::ids_paginated`] will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// A registry of modules of one kind, checked against silent code replacement.
///
/// The host is fixed at construction and there is no way to swap it: the
/// registry is the anchor that fingerprint comparisons trust.
///
/// Every mutator confirms its witness against the shared [`Governance`], so
/// nothing here changes after ossification.
pub struct IntegrityRegistry<M: ?Sized> {
    /// Registry label used in audit events and logs.
    name: &'static str,
    host: Arc<dyn ModuleHost<M>>,
    governance: Governance,
    audit: Arc<dyn AuditSink>,
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    records: HashMap<ModuleId, ModuleRecord>,
    /// Registration order, for index-based enumeration.
    order: Vec<ModuleId>,
}

impl<M: ?Sized> IntegrityRegistry<M> {
    /// Create an empty registry.
    pub fn new(
        name: &'static str,
        host: Arc<dyn ModuleHost<M>>,
        governance: Governance,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            name,
            host,
            governance,
            audit,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Rebuild a registry from persisted records, in registration order.
    ///
    /// Fingerprints are taken as stored, not recomputed, so code swapped
    /// while the registry was offline is still caught on the next lookup.
    pub fn from_records(
        name: &'static str,
        host: Arc<dyn ModuleHost<M>>,
        governance: Governance,
        audit: Arc<dyn AuditSink>,
        records: impl IntoIterator<Item = ModuleRecord>,
    ) -> Result<Self> {
        let mut inner = RegistryInner::default();
        for record in records {
            if inner.records.contains_key(&record.id) {
                return Err(RegistryError::AlreadyRegistered(record.id));
            }
            inner.order.push(record.id);
            inner.records.insert(record.id, record);
        }
        Ok(Self {
            name,
            host,
            governance,
            audit,
            inner: RwLock::new(inner),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register the module deployed at `reference` under `id`.
    ///
    /// Captures the module's fingerprint at this instant and returns it.
    pub fn register(
        &self,
        witness: &GovernanceWitness,
        id: ModuleId,
        reference: Address,
        module_type: &str,
        description: &str,
        now: i64,
    ) -> Result<Fingerprint> {
        self.governance.confirm(witness)?;
        validate_metadata(description, module_type)?;

        if self.read().records.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        let fingerprint = self
            .host
            .fingerprint(&reference)
            .ok_or(RegistryError::NotAModule(reference))?;

        let record = ModuleRecord {
            id,
            reference,
            fingerprint,
            active: true,
            registered_at: now,
            description: description.to_string(),
            module_type: module_type.to_string(),
        };

        {
            let mut inner = self.write();
            // Re-check under the write lock.
            if inner.records.contains_key(&id) {
                return Err(RegistryError::AlreadyRegistered(id));
            }
            inner.order.push(id);
            inner.records.insert(id, record);
        }

        tracing::info!(
            registry = self.name,
            %id,
            %reference,
            %fingerprint,
            module_type,
            "module registered"
        );
        self.audit.record(AuditEvent::ModuleRegistered {
            registry: self.name,
            id,
            reference,
            fingerprint,
            module_type: module_type.to_string(),
            by: witness.actor(),
            at: now,
        });

        Ok(fingerprint)
    }

    /// Stop returning the module from lookups.
    pub fn deactivate(&self, witness: &GovernanceWitness, id: &ModuleId, now: i64) -> Result<()> {
        self.governance.confirm(witness)?;
        {
            let mut inner = self.write();
            let record = inner
                .records
                .get_mut(id)
                .ok_or(RegistryError::NotFound(*id))?;
            if !record.active {
                return Err(RegistryError::AlreadyInState {
                    id: *id,
                    active: false,
                });
            }
            record.active = false;
        }

        tracing::info!(registry = self.name, %id, "module deactivated");
        self.audit.record(AuditEvent::ModuleDeactivated {
            registry: self.name,
            id: *id,
            by: witness.actor(),
            at: now,
        });
        Ok(())
    }

    /// Return a deactivated module to service.
    ///
    /// Fails with [`RegistryError::IdentityChanged`] if the code was swapped
    /// while the module was inactive.
    pub fn reactivate(&self, witness: &GovernanceWitness, id: &ModuleId, now: i64) -> Result<()> {
        self.governance.confirm(witness)?;
        {
            let mut inner = self.write();
            let record = inner
                .records
                .get_mut(id)
                .ok_or(RegistryError::NotFound(*id))?;
            if record.active {
                return Err(RegistryError::AlreadyInState {
                    id: *id,
                    active: true,
                });
            }
            let actual = self.host.fingerprint(&record.reference);
            if actual != Some(record.fingerprint) {
                tracing::warn!(
                    registry = self.name,
                    %id,
                    expected = %record.fingerprint,
                    ?actual,
                    "refusing to reactivate module with changed identity"
                );
                return Err(RegistryError::IdentityChanged {
                    id: *id,
                    expected: record.fingerprint,
                    actual,
                });
            }
            record.active = true;
        }

        tracing::info!(registry = self.name, %id, "module reactivated");
        self.audit.record(AuditEvent::ModuleReactivated {
            registry: self.name,
            id: *id,
            by: witness.actor(),
            at: now,
        });
        Ok(())
    }

    /// Update description and module type. Reference and fingerprint are fixed.
    pub fn update_metadata(
        &self,
        witness: &GovernanceWitness,
        id: &ModuleId,
        description: &str,
        module_type: &str,
    ) -> Result<()> {
        self.governance.confirm(witness)?;
        validate_metadata(description, module_type)?;
        {
            let mut inner = self.write();
            let record = inner
                .records
                .get_mut(id)
                .ok_or(RegistryError::NotFound(*id))?;
            record.description = description.to_string();
            record.module_type = module_type.to_string();
        }

        self.audit.record(AuditEvent::ModuleMetadataUpdated {
            registry: self.name,
            id: *id,
            module_type: module_type.to_string(),
            description: description.to_string(),
            by: witness.actor(),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The module registered under `id`, if it is active and its code is
    /// unchanged since registration.
    ///
    /// Returns `None` rather than an error for unknown, inactive and
    /// tampered modules. Callers decide whether that aborts or falls back.
    pub fn lookup(&self, id: &ModuleId) -> Option<Arc<M>> {
        let (reference, expected) = {
            let inner = self.read();
            let record = inner.records.get(id)?;
            if !record.active {
                return None;
            }
            (record.reference, record.fingerprint)
        };

        let actual = self.host.fingerprint(&reference);
        if actual != Some(expected) {
            tracing::warn!(
                registry = self.name,
                %id,
                %reference,
                %expected,
                ?actual,
                "module identity changed since registration"
            );
            return None;
        }
        self.host.load(&reference)
    }

    /// Whether [`lookup`](Self::lookup) would currently succeed.
    pub fn is_available(&self, id: &ModuleId) -> bool {
        self.lookup(id).is_some()
    }

    /// Whether the code at the module's reference still matches the
    /// registered fingerprint, regardless of activation state.
    pub fn verify_integrity(&self, id: &ModuleId) -> Result<bool> {
        let (reference, expected) = {
            let inner = self.read();
            let record = inner.records.get(id).ok_or(RegistryError::NotFound(*id))?;
            (record.reference, record.fingerprint)
        };
        Ok(self.host.fingerprint(&reference) == Some(expected))
    }

    /// The full record, without the integrity recheck.
    pub fn get_info(&self, id: &ModuleId) -> Result<ModuleRecord> {
        self.read()
            .records
            .get(id)
            .cloned()
            .ok_or(RegistryError::NotFound(*id))
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.read().records.contains_key(id)
    }

    /// Number of registrations, active or not.
    pub fn count(&self) -> usize {
        self.read().order.len()
    }

    /// The id registered at position `index` (registration order).
    pub fn id_at(&self, index: usize) -> Option<ModuleId> {
        self.read().order.get(index).copied()
    }

    /// Up to `limit` ids starting at `offset`. `limit` is capped at
    /// [`MAX_PAGE_SIZE`].
    pub fn ids_paginated(&self, offset: usize, limit: usize) -> Page {
        Page::slice(&self.read().order, offset, limit)
    }

    /// Every registered id.
    ///
    /// Cost grows with the registry. Prefer [`ids_paginated`](Self::ids_paginated)
    /// on any path an untrusted caller can trigger.
    pub fn all_ids(&self) -> Vec<ModuleId> {
        self.read().order.clone()
    }

    /// Every record, in registration order. Used for persistence.
    pub fn records(&self) -> Vec<ModuleRecord> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_metadata(description: &str, module_type: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(RegistryError::InvalidMetadata("description is empty".into()));
    }
    if module_type.trim().is_empty() {
        return Err(RegistryError::InvalidMetadata("module type is empty".into()));
    }
    Ok(())
}
