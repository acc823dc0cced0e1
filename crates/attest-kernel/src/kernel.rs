//! The Kernel: unified API for the attestation access-control system.
//!
//! The Kernel brings together access control, the three module registries
//! and the subject registry into one interface. It owns subjects, their
//! composed resolvers and their executor delegations.
//!
//! Every subject mutator follows the same order: checks, reentrancy guard,
//! resolver hooks, commit, audit. Hooks run before the commit, so a failing
//! primary resolver leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use attest_kernel_access::{
    AccessControl, AccessError, AccessRequest, AttestationProvider, ProofVerifier,
    ProviderRegistry, VerifierRegistry,
};
use attest_kernel_core::{
    Address, AuditEvent, AuditSink, CallContext, Capabilities, Clock, Governance,
    GovernanceWitness, GuardScope, GuardTicket, ModuleId, ReentrancyGuard, ResolverHook, Stage, StageTransition,
    SubjectId,
};
use attest_kernel_registry::{ModuleHost, Page};

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::executor::{check_executor, Executor};
use crate::resolver::{invoke_hook, DocumentResolver, HookFailure, ResolverRegistry};
use crate::subject::{ExecutorDelegation, NewSubject, SubjectRecord, UnlockRecord};

/// Where each kind of module is deployed.
#[derive(Clone)]
pub struct KernelHosts {
    pub providers: Arc<dyn ModuleHost<dyn AttestationProvider>>,
    pub verifiers: Arc<dyn ModuleHost<dyn ProofVerifier>>,
    pub resolvers: Arc<dyn ModuleHost<dyn DocumentResolver>>,
    pub executors: Arc<dyn ModuleHost<dyn Executor>>,
}

/// Subject-side state.
#[derive(Debug, Default)]
pub(crate) struct SubjectState {
    pub(crate) subjects: HashMap<SubjectId, SubjectRecord>,
    /// Registration order, for enumeration.
    pub(crate) order: Vec<SubjectId>,
    pub(crate) executors: HashMap<SubjectId, ExecutorDelegation>,
    pub(crate) whitelist: BTreeSet<Address>,
    pub(crate) budgets: BTreeMap<ModuleId, u64>,
    pub(crate) unlocks: Vec<UnlockRecord>,
}

/// The main Kernel struct.
///
/// Provides a unified API for:
/// - Governance and pause control
/// - Capability verification
/// - Registering and transferring subjects
/// - Composing resolvers onto subjects
/// - Delegating to executors
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) access: AccessControl,
    pub(crate) verifiers: Arc<VerifierRegistry>,
    pub(crate) resolvers: Arc<ResolverRegistry>,
    pub(crate) executors: Arc<dyn ModuleHost<dyn Executor>>,
    pub(crate) guard: ReentrancyGuard,
    pub(crate) state: RwLock<SubjectState>,
}

impl Kernel {
    /// Create a new kernel with empty registries, governed by `bootstrap_actor`.
    pub fn new(
        bootstrap_actor: Address,
        hosts: KernelHosts,
        config: KernelConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let governance = Governance::new(bootstrap_actor);
        let providers = Arc::new(ProviderRegistry::new(
            "provider",
            hosts.providers,
            governance.clone(),
            audit.clone(),
        ));
        let verifiers = Arc::new(VerifierRegistry::new(
            "verifier",
            hosts.verifiers,
            governance.clone(),
            audit.clone(),
        ));
        let resolvers = Arc::new(ResolverRegistry::new(
            "resolver",
            hosts.resolvers,
            governance.clone(),
            audit.clone(),
        ));
        let access = AccessControl::new(governance, providers, audit.clone(), config.access.clone());
        Self::assemble(
            access,
            verifiers,
            resolvers,
            hosts.executors,
            SubjectState::default(),
            config,
            clock,
            audit,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        access: AccessControl,
        verifiers: Arc<VerifierRegistry>,
        resolvers: Arc<ResolverRegistry>,
        executors: Arc<dyn ModuleHost<dyn Executor>>,
        state: SubjectState,
        config: KernelConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            clock,
            audit,
            access,
            verifiers,
            resolvers,
            executors,
            guard: ReentrancyGuard::new(),
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        self.access.providers()
    }

    pub fn verifiers(&self) -> &Arc<VerifierRegistry> {
        &self.verifiers
    }

    pub fn resolvers(&self) -> &Arc<ResolverRegistry> {
        &self.resolvers
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    pub fn stage(&self) -> Stage {
        self.access.stage()
    }

    /// Obtain a witness for a governance-gated mutation.
    pub fn authorize(&self, caller: Address) -> Result<GovernanceWitness> {
        Ok(self.access.authorize(caller)?)
    }

    pub fn promote_to_multisig(&self, caller: Address, multisig: Address) -> Result<StageTransition> {
        Ok(self.access.promote_to_multisig(caller, multisig, self.now())?)
    }

    pub fn promote_to_dao(&self, caller: Address, dao: Address) -> Result<StageTransition> {
        Ok(self.access.promote_to_dao(caller, dao, self.now())?)
    }

    pub fn ossify(&self, caller: Address) -> Result<StageTransition> {
        Ok(self.access.ossify(caller, self.now())?)
    }

    pub fn is_paused(&self) -> bool {
        self.access.is_paused()
    }

    pub fn pause(&self, witness: &GovernanceWitness) -> Result<()> {
        Ok(self.access.pause(witness, self.now())?)
    }

    pub fn unpause(&self, witness: &GovernanceWitness) -> Result<()> {
        Ok(self.access.unpause(witness, self.now())?)
    }

    pub fn set_default_provider(&self, witness: &GovernanceWitness, provider: ModuleId) -> Result<()> {
        Ok(self.access.set_default_provider(witness, provider)?)
    }

    /// Allow or disallow `executor` to be delegated to without probing it.
    pub fn set_executor_whitelisted(
        &self,
        witness: &GovernanceWitness,
        executor: Address,
        whitelisted: bool,
    ) -> Result<()> {
        self.access.confirm(witness)?;
        if executor.is_zero() {
            return Err(KernelError::InvalidArgument("zero executor".into()));
        }
        let changed = {
            let mut state = self.write();
            if whitelisted {
                state.whitelist.insert(executor)
            } else {
                state.whitelist.remove(&executor)
            }
        };
        if changed {
            tracing::info!(%executor, whitelisted, "executor whitelist changed");
            self.audit.record(AuditEvent::ExecutorWhitelistChanged {
                executor,
                whitelisted,
                by: witness.actor(),
            });
        }
        Ok(())
    }

    /// Override the per-call budget of a registered resolver, or clear it.
    pub fn set_resolver_budget(
        &self,
        witness: &GovernanceWitness,
        resolver: ModuleId,
        budget: Option<u64>,
    ) -> Result<()> {
        self.access.confirm(witness)?;
        if let Some(units) = budget {
            let ceiling = self.config.resolver_budgets.hard_ceiling;
            if units == 0 || units > ceiling {
                return Err(KernelError::InvalidArgument(format!(
                    "resolver budget {} outside 1..={}",
                    units, ceiling
                )));
            }
        }
        self.resolvers.get_info(&resolver)?;
        {
            let mut state = self.write();
            match budget {
                Some(units) => state.budgets.insert(resolver, units),
                None => state.budgets.remove(&resolver),
            };
        }
        tracing::info!(%resolver, ?budget, "resolver budget changed");
        self.audit.record(AuditEvent::ResolverBudgetChanged {
            resolver,
            budget,
            by: witness.actor(),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Read-only capability check.
    pub fn check_capability(&self, request: &AccessRequest<'_>) -> Result<Capabilities> {
        Ok(self.access.check_capability(request, self.now())?)
    }

    /// Verify a capability for a state-changing operation.
    pub fn verify_capability(&self, request: &AccessRequest<'_>) -> Result<Capabilities> {
        Ok(self.access.verify_capability(request, self.now())?)
    }

    /// Run `body` only after `request` verifies, with the subject guarded
    /// for the duration.
    pub fn guarded<T, E, F>(&self, request: &AccessRequest<'_>, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Capabilities) -> std::result::Result<T, E>,
        E: From<AccessError>,
    {
        self.access.guarded(request, self.now(), body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subject Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a subject owned by `caller`.
    ///
    /// The primary resolver's `on_registered` must succeed or nothing is
    /// created. Additional resolvers are notified best-effort.
    pub fn register_subject(&self, caller: Address, subject: NewSubject) -> Result<SubjectRecord> {
        if caller.is_zero() {
            return Err(KernelError::InvalidArgument("zero owner".into()));
        }
        self.ensure_live()?;
        let id = subject.id;
        if self.exists(&id) {
            return Err(KernelError::SubjectExists(id));
        }
        if let Some(parent) = &subject.parent {
            if !self.exists(parent) {
                return Err(KernelError::SubjectNotFound(*parent));
            }
        }
        let max = self.config.additional_resolver_limit();
        if subject.additional_resolvers.len() > max {
            return Err(KernelError::TooManyResolvers { subject: id, max });
        }
        let mut seen = BTreeSet::new();
        for resolver in subject.primary_resolver.iter().chain(&subject.additional_resolvers) {
            if !seen.insert(*resolver) {
                return Err(KernelError::DuplicateResolver(*resolver));
            }
            self.validate_resolver(resolver)?;
        }

        let _ticket = self.enter(id)?;
        let now = self.now();
        let record = SubjectRecord {
            id,
            owner: caller,
            module: subject.module,
            content_hash: subject.content_hash,
            parent: subject.parent,
            extension: subject.extension,
            primary_resolver: subject.primary_resolver,
            additional_resolvers: subject.additional_resolvers,
            resolvers_locked: false,
            registered_at: now,
        };

        if let Some(primary) = record.primary_resolver {
            self.call_primary(id, primary, ResolverHook::Registered, now, |r, ctx| {
                Ok(r.on_registered(&record, ctx)?)
            })
            .map_err(|failure| blocking_error(id, primary, failure))?;
        }
        self.call_additional(&record, ResolverHook::Registered, now, |r, ctx| {
            Ok(r.on_registered(&record, ctx)?)
        });

        {
            let mut state = self.write();
            if state.subjects.contains_key(&id) {
                return Err(KernelError::SubjectExists(id));
            }
            state.subjects.insert(id, record.clone());
            state.order.push(id);
        }

        tracing::info!(subject = %id, owner = %caller, "subject registered");
        self.audit.record(AuditEvent::SubjectRegistered {
            subject: id,
            owner: caller,
            at: now,
        });
        Ok(record)
    }

    /// Transfer ownership to `new_owner`. Callable by the owner or executor.
    ///
    /// The primary resolver may veto through `can_own_document`. Any
    /// executor delegation ends with the transfer.
    pub fn transfer_ownership(&self, caller: Address, subject: SubjectId, new_owner: Address) -> Result<()> {
        if new_owner.is_zero() {
            return Err(KernelError::InvalidArgument("zero owner".into()));
        }
        self.ensure_live()?;
        let record = self.load(&subject)?;
        self.require_owner_or_executor(&record, caller)?;
        if record.owner == new_owner {
            return Err(KernelError::InvalidArgument(format!(
                "{} already owns {}",
                new_owner, subject
            )));
        }

        let _ticket = self.enter(subject)?;
        let now = self.now();
        let previous = record.owner;

        if let Some(primary) = record.primary_resolver {
            let vetted = self.call_primary(subject, primary, ResolverHook::CanOwnDocument, now, |r, ctx| {
                if r.can_own_document(subject, new_owner, ctx)? {
                    Ok(())
                } else {
                    Err(HookFailure::Rejected)
                }
            });
            match vetted {
                Ok(()) => {}
                Err(HookFailure::Rejected) => {
                    return Err(KernelError::TransferRejected {
                        resolver: primary,
                        candidate: new_owner,
                    })
                }
                Err(failure) => return Err(blocking_error(subject, primary, failure)),
            }
            self.call_primary(subject, primary, ResolverHook::OwnershipTransferred, now, |r, ctx| {
                Ok(r.on_ownership_transferred(subject, previous, new_owner, ctx)?)
            })
            .map_err(|failure| blocking_error(subject, primary, failure))?;
        }
        self.call_additional(&record, ResolverHook::OwnershipTransferred, now, |r, ctx| {
            Ok(r.on_ownership_transferred(subject, previous, new_owner, ctx)?)
        });

        let dropped = {
            let mut state = self.write();
            let entry = state
                .subjects
                .get_mut(&subject)
                .ok_or(KernelError::SubjectNotFound(subject))?;
            entry.owner = new_owner;
            state.executors.remove(&subject)
        };

        tracing::info!(%subject, %previous, owner = %new_owner, "ownership transferred");
        self.audit.record(AuditEvent::OwnershipTransferred {
            subject,
            previous,
            owner: new_owner,
            by: caller,
            at: now,
        });
        if let Some(delegation) = dropped {
            self.audit.record(AuditEvent::ExecutorRevoked {
                subject,
                executor: delegation.executor,
                by: caller,
            });
        }
        Ok(())
    }

    /// Associate a module (e.g. a tokenizer) with a subject. Callable by the
    /// owner or executor.
    pub fn associate_module(&self, caller: Address, subject: SubjectId, module: Address) -> Result<()> {
        if module.is_zero() {
            return Err(KernelError::InvalidArgument("zero module".into()));
        }
        self.ensure_live()?;
        let record = self.load(&subject)?;
        self.require_owner_or_executor(&record, caller)?;

        let _ticket = self.enter(subject)?;
        let now = self.now();

        if let Some(primary) = record.primary_resolver {
            self.call_primary(subject, primary, ResolverHook::ModuleAssociated, now, |r, ctx| {
                Ok(r.on_module_associated(subject, module, ctx)?)
            })
            .map_err(|failure| blocking_error(subject, primary, failure))?;
        }
        self.call_additional(&record, ResolverHook::ModuleAssociated, now, |r, ctx| {
            Ok(r.on_module_associated(subject, module, ctx)?)
        });

        self.update(&subject, |entry| {
            entry.module = Some(module);
            Ok(())
        })?;

        tracing::debug!(%subject, %module, "module associated");
        self.audit.record(AuditEvent::ModuleAssociated {
            subject,
            module,
            by: caller,
        });
        Ok(())
    }

    /// Set or clear the subject's provider override. Owner only.
    pub fn set_subject_provider(
        &self,
        caller: Address,
        subject: SubjectId,
        provider: Option<ModuleId>,
    ) -> Result<()> {
        self.ensure_live()?;
        let record = self.load(&subject)?;
        require_owner(&record, caller)?;
        let _ticket = self.enter(subject)?;
        Ok(self.access.set_subject_provider(subject, provider, caller)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolver Composition
    // ─────────────────────────────────────────────────────────────────────────

    /// Set or clear the primary resolver. Owner only, while unlocked.
    pub fn set_primary_resolver(
        &self,
        caller: Address,
        subject: SubjectId,
        resolver: Option<ModuleId>,
    ) -> Result<()> {
        self.ensure_live()?;
        self.require_configurable(&subject, caller)?;
        if let Some(id) = &resolver {
            self.validate_resolver(id)?;
        }

        let _ticket = self.enter(subject)?;
        self.update(&subject, |entry| {
            if let Some(id) = &resolver {
                if entry.additional_resolvers.contains(id) {
                    return Err(KernelError::DuplicateResolver(*id));
                }
            }
            entry.primary_resolver = resolver;
            Ok(())
        })?;

        tracing::info!(%subject, ?resolver, "primary resolver changed");
        self.audit.record(AuditEvent::PrimaryResolverChanged {
            subject,
            resolver,
            by: caller,
        });
        Ok(())
    }

    /// Attach a best-effort resolver. Owner only, while unlocked.
    pub fn add_additional_resolver(&self, caller: Address, subject: SubjectId, resolver: ModuleId) -> Result<()> {
        self.ensure_live()?;
        self.require_configurable(&subject, caller)?;
        self.validate_resolver(&resolver)?;

        let _ticket = self.enter(subject)?;
        let max = self.config.additional_resolver_limit();
        self.update(&subject, |entry| {
            if entry.has_resolver(&resolver) {
                return Err(KernelError::DuplicateResolver(resolver));
            }
            if entry.additional_resolvers.len() >= max {
                return Err(KernelError::TooManyResolvers { subject, max });
            }
            entry.additional_resolvers.push(resolver);
            Ok(())
        })?;

        tracing::info!(%subject, %resolver, "additional resolver added");
        self.audit.record(AuditEvent::AdditionalResolverAdded {
            subject,
            resolver,
            by: caller,
        });
        Ok(())
    }

    /// Detach a best-effort resolver. Owner only, while unlocked.
    pub fn remove_additional_resolver(&self, caller: Address, subject: SubjectId, resolver: ModuleId) -> Result<()> {
        self.ensure_live()?;
        self.require_configurable(&subject, caller)?;

        let _ticket = self.enter(subject)?;
        self.update(&subject, |entry| {
            let position = entry
                .additional_resolvers
                .iter()
                .position(|r| r == &resolver)
                .ok_or(KernelError::ResolverNotAttached(resolver))?;
            entry.additional_resolvers.remove(position);
            Ok(())
        })?;

        tracing::info!(%subject, %resolver, "additional resolver removed");
        self.audit.record(AuditEvent::AdditionalResolverRemoved {
            subject,
            resolver,
            by: caller,
        });
        Ok(())
    }

    /// Freeze the resolver configuration. Owner only.
    ///
    /// Only an emergency unlock can undo this.
    pub fn lock_resolvers(&self, caller: Address, subject: SubjectId) -> Result<()> {
        self.ensure_live()?;
        self.require_configurable(&subject, caller)?;

        let _ticket = self.enter(subject)?;
        let now = self.now();
        self.update(&subject, |entry| {
            if entry.resolvers_locked {
                return Err(KernelError::ResolversLocked(subject));
            }
            entry.resolvers_locked = true;
            Ok(())
        })?;

        tracing::info!(%subject, "resolvers locked");
        self.audit.record(AuditEvent::ResolversLocked {
            subject,
            by: caller,
            at: now,
        });
        Ok(())
    }

    /// Unfreeze a locked resolver configuration.
    ///
    /// Callable by the emergency actor until the emergency expiry, and by
    /// governance until ossification. Works while paused. The justification
    /// is kept in the unlock history.
    pub fn emergency_unlock(&self, caller: Address, subject: SubjectId, justification: &str) -> Result<()> {
        let now = self.now();
        self.require_emergency_authority(caller, now)?;
        let justification = justification.trim();
        if justification.is_empty() {
            return Err(KernelError::InvalidArgument("empty justification".into()));
        }

        let _ticket = self.enter(subject)?;
        let unlock = UnlockRecord {
            subject,
            by: caller,
            justification: justification.to_string(),
            at: now,
        };
        {
            let mut state = self.write();
            let entry = state
                .subjects
                .get_mut(&subject)
                .ok_or(KernelError::SubjectNotFound(subject))?;
            if !entry.resolvers_locked {
                return Err(KernelError::ResolversNotLocked(subject));
            }
            entry.resolvers_locked = false;
            state.unlocks.push(unlock.clone());
        }

        tracing::warn!(%subject, by = %caller, justification = %unlock.justification, "emergency unlock");
        self.audit.record(AuditEvent::EmergencyUnlocked {
            subject,
            by: caller,
            justification: unlock.justification,
            at: now,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Executor Delegation
    // ─────────────────────────────────────────────────────────────────────────

    /// Delegate to `executor`. Owner only; fails if one is already set.
    pub fn authorize_executor(&self, caller: Address, subject: SubjectId, executor: Address) -> Result<()> {
        self.ensure_live()?;
        let record = self.load(&subject)?;
        require_owner(&record, caller)?;
        if let Some(existing) = self.executor_of(&subject) {
            return Err(KernelError::ExecutorAlreadySet {
                subject,
                executor: existing,
            });
        }

        let _ticket = self.enter(subject)?;
        let now = self.now();
        self.vet_executor(&record, executor, now)?;
        {
            let mut state = self.write();
            if let Some(existing) = state.executors.get(&subject) {
                return Err(KernelError::ExecutorAlreadySet {
                    subject,
                    executor: existing.executor,
                });
            }
            state.executors.insert(
                subject,
                ExecutorDelegation {
                    executor,
                    authorized_at: now,
                },
            );
        }

        tracing::info!(%subject, %executor, "executor authorized");
        self.audit.record(AuditEvent::ExecutorAuthorized {
            subject,
            executor,
            by: caller,
        });
        Ok(())
    }

    /// End the current delegation. Owner only.
    pub fn revoke_executor(&self, caller: Address, subject: SubjectId) -> Result<()> {
        self.ensure_live()?;
        let record = self.load(&subject)?;
        require_owner(&record, caller)?;

        let _ticket = self.enter(subject)?;
        let removed = self
            .write()
            .executors
            .remove(&subject)
            .ok_or(KernelError::NoExecutor(subject))?;

        tracing::info!(%subject, executor = %removed.executor, "executor revoked");
        self.audit.record(AuditEvent::ExecutorRevoked {
            subject,
            executor: removed.executor,
            by: caller,
        });
        Ok(())
    }

    /// Swap the current executor for `executor` in one step, so the subject
    /// is never without a delegate. Owner only.
    pub fn replace_executor(&self, caller: Address, subject: SubjectId, executor: Address) -> Result<()> {
        self.ensure_live()?;
        let record = self.load(&subject)?;
        require_owner(&record, caller)?;
        let current = self
            .executor_of(&subject)
            .ok_or(KernelError::NoExecutor(subject))?;
        if current == executor {
            return Err(KernelError::InvalidArgument(format!(
                "{} is already the executor",
                executor
            )));
        }

        let _ticket = self.enter(subject)?;
        let now = self.now();
        self.vet_executor(&record, executor, now)?;
        let previous = {
            let mut state = self.write();
            let slot = state
                .executors
                .get_mut(&subject)
                .ok_or(KernelError::NoExecutor(subject))?;
            std::mem::replace(
                slot,
                ExecutorDelegation {
                    executor,
                    authorized_at: now,
                },
            )
        };

        tracing::info!(%subject, previous = %previous.executor, current = %executor, "executor replaced");
        self.audit.record(AuditEvent::ExecutorReplaced {
            subject,
            previous: previous.executor,
            current: executor,
            by: caller,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn subject(&self, id: &SubjectId) -> Option<SubjectRecord> {
        self.read().subjects.get(id).cloned()
    }

    pub fn exists(&self, id: &SubjectId) -> bool {
        self.read().subjects.contains_key(id)
    }

    pub fn executor_of(&self, id: &SubjectId) -> Option<Address> {
        self.read().executors.get(id).map(|d| d.executor)
    }

    pub fn delegation(&self, id: &SubjectId) -> Option<ExecutorDelegation> {
        self.read().executors.get(id).copied()
    }

    pub fn subject_count(&self) -> usize {
        self.read().order.len()
    }

    /// Subject ids in registration order.
    pub fn subject_ids_paginated(&self, offset: usize, limit: usize) -> Page<SubjectId> {
        Page::slice(&self.read().order, offset, limit)
    }

    /// Every emergency unlock, oldest first.
    pub fn unlock_history(&self) -> Vec<UnlockRecord> {
        self.read().unlocks.clone()
    }

    pub fn is_whitelisted(&self, executor: &Address) -> bool {
        self.read().whitelist.contains(executor)
    }

    /// The governance override for `resolver`, if any.
    pub fn resolver_budget(&self, resolver: &ModuleId) -> Option<u64> {
        self.read().budgets.get(resolver).copied()
    }

    pub fn emergency_actor(&self) -> Option<Address> {
        self.config.emergency_actor
    }

    pub fn emergency_expiry(&self) -> i64 {
        self.config.emergency_expiry
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<()> {
        if self.access.is_paused() {
            return Err(AccessError::SystemPaused.into());
        }
        Ok(())
    }

    fn enter(&self, subject: SubjectId) -> Result<GuardTicket<'_>> {
        Ok(self.guard.enter(GuardScope::Subject("subject", subject))?)
    }

    fn load(&self, id: &SubjectId) -> Result<SubjectRecord> {
        self.subject(id).ok_or(KernelError::SubjectNotFound(*id))
    }

    /// Apply `change` to the stored record under the write lock.
    fn update<F>(&self, id: &SubjectId, change: F) -> Result<()>
    where
        F: FnOnce(&mut SubjectRecord) -> Result<()>,
    {
        let mut state = self.write();
        let entry = state
            .subjects
            .get_mut(id)
            .ok_or(KernelError::SubjectNotFound(*id))?;
        change(entry)
    }

    fn require_owner_or_executor(&self, record: &SubjectRecord, caller: Address) -> Result<()> {
        if record.owner == caller || self.executor_of(&record.id) == Some(caller) {
            return Ok(());
        }
        Err(KernelError::NotOwnerOrExecutor {
            subject: record.id,
            caller,
        })
    }

    /// Owner check plus the lock check every resolver mutation needs.
    fn require_configurable(&self, subject: &SubjectId, caller: Address) -> Result<()> {
        let record = self.load(subject)?;
        require_owner(&record, caller)?;
        if record.resolvers_locked {
            return Err(KernelError::ResolversLocked(*subject));
        }
        Ok(())
    }

    fn require_emergency_authority(&self, caller: Address, now: i64) -> Result<()> {
        if self.config.emergency_actor == Some(caller) {
            if now <= self.config.emergency_expiry {
                return Ok(());
            }
            // The same address may also hold governance authority.
            return match self.access.authorize(caller) {
                Ok(_) => Ok(()),
                Err(_) => Err(KernelError::EmergencyExpired {
                    expired_at: self.config.emergency_expiry,
                }),
            };
        }
        self.access.authorize(caller)?;
        Ok(())
    }

    /// A resolver may be attached only if registered, active and unchanged.
    fn validate_resolver(&self, id: &ModuleId) -> Result<()> {
        let record = self.resolvers.get_info(id)?;
        if !record.active {
            return Err(KernelError::ResolverInactive(*id));
        }
        if !self.resolvers.verify_integrity(id)? {
            return Err(KernelError::ResolverIdentityChanged(*id));
        }
        Ok(())
    }

    fn vet_executor(&self, record: &SubjectRecord, executor: Address, now: i64) -> Result<()> {
        if executor.is_zero() {
            return Err(KernelError::InvalidArgument("zero executor".into()));
        }
        if executor == record.owner {
            return Err(KernelError::InvalidArgument(
                "owner cannot be its own executor".into(),
            ));
        }
        let verdict = check_executor(
            &self.executors,
            self.is_whitelisted(&executor),
            &executor,
            record.id,
            record.owner,
            self.config.executor_budget,
            now,
        );
        tracing::debug!(subject = %record.id, %executor, ?verdict, "executor checked");
        if verdict.is_accepted() {
            Ok(())
        } else {
            Err(KernelError::ExecutorRejected(executor))
        }
    }

    fn hook_budget(&self, resolver: &ModuleId, primary: bool) -> u64 {
        let override_budget = self.resolver_budget(resolver);
        self.config
            .resolver_budgets
            .budget_for(override_budget, primary)
    }

    /// Run a blocking hook on the primary resolver. Failures are audited.
    fn call_primary<F>(
        &self,
        subject: SubjectId,
        resolver: ModuleId,
        hook: ResolverHook,
        now: i64,
        call: F,
    ) -> std::result::Result<(), HookFailure>
    where
        F: FnOnce(&dyn DocumentResolver, &mut CallContext<'_>) -> std::result::Result<(), HookFailure>,
    {
        let budget = self.hook_budget(&resolver, true);
        invoke_hook(&self.resolvers, &resolver, budget, now, call).map_err(|failure| {
            tracing::warn!(%subject, %resolver, %hook, %failure, "primary resolver hook failed");
            self.audit.record(AuditEvent::ResolverCallFailed {
                subject,
                resolver,
                hook,
                blocking: true,
                reason: failure.to_string(),
            });
            failure
        })
    }

    /// Run a best-effort hook on every additional resolver.
    fn call_additional<F>(&self, record: &SubjectRecord, hook: ResolverHook, now: i64, call: F)
    where
        F: Fn(&dyn DocumentResolver, &mut CallContext<'_>) -> std::result::Result<(), HookFailure>,
    {
        for resolver in &record.additional_resolvers {
            let budget = self.hook_budget(resolver, false);
            if let Err(failure) = invoke_hook(&self.resolvers, resolver, budget, now, &call) {
                tracing::warn!(subject = %record.id, %resolver, %hook, %failure, "additional resolver hook failed");
                self.audit.record(AuditEvent::ResolverCallFailed {
                    subject: record.id,
                    resolver: *resolver,
                    hook,
                    blocking: false,
                    reason: failure.to_string(),
                });
            }
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SubjectState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubjectState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn require_owner(record: &SubjectRecord, caller: Address) -> Result<()> {
    if record.owner != caller {
        return Err(KernelError::NotOwner {
            subject: record.id,
            caller,
        });
    }
    Ok(())
}

fn blocking_error(subject: SubjectId, resolver: ModuleId, failure: HookFailure) -> KernelError {
    match failure {
        HookFailure::Unavailable => KernelError::ResolverUnavailable { subject, resolver },
        HookFailure::Failed(reason) => KernelError::ResolverFailed { resolver, reason },
        HookFailure::OverBudget { limit } => KernelError::ResolverOverBudget { resolver, limit },
        HookFailure::Rejected => KernelError::ResolverFailed {
            resolver,
            reason: HookFailure::Rejected.to_string(),
        },
    }
}
