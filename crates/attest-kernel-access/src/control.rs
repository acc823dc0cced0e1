//! The access-control core: provider selection, verification and governance.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use attest_kernel_core::{
    capability, Address, AuditEvent, AuditSink, Blake3Hash, CallContext, Capabilities,
    Governance, GovernanceWitness, GuardScope, ModuleId, ReentrancyGuard, ResourceMeter, Stage,
    StageTransition, SubjectId,
};

use crate::error::{AccessError, Result};
use crate::provider::ProviderRegistry;

/// Access-control configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    /// Resource budget for a single provider call.
    pub provider_budget: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            provider_budget: 300_000,
        }
    }
}

/// A capability check: who wants what on which subject, and their evidence.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub principal: Address,
    pub subject: SubjectId,
    pub required: Capabilities,
    pub proof: &'a [u8],
}

impl<'a> AccessRequest<'a> {
    pub fn new(
        principal: Address,
        subject: SubjectId,
        required: Capabilities,
        proof: &'a [u8],
    ) -> Self {
        Self {
            principal,
            subject,
            required,
            proof,
        }
    }
}

/// Persistent provider selection and pause state.
///
/// Governance is persisted separately; it is shared with the registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSnapshot {
    pub default_provider: Option<ModuleId>,
    pub subject_providers: BTreeMap<SubjectId, ModuleId>,
    pub paused: bool,
}

/// Routes capability checks to the selected provider and owns governance.
///
/// The provider registry is injected at construction and cannot be replaced.
pub struct AccessControl {
    governance: Governance,
    providers: Arc<ProviderRegistry>,
    audit: Arc<dyn AuditSink>,
    config: AccessConfig,
    guard: ReentrancyGuard,
    state: RwLock<AccessSnapshot>,
}

impl AccessControl {
    /// Create an access-control core with no provider selected.
    ///
    /// `governance` must be the handle `providers` was built with.
    pub fn new(
        governance: Governance,
        providers: Arc<ProviderRegistry>,
        audit: Arc<dyn AuditSink>,
        config: AccessConfig,
    ) -> Self {
        Self::from_snapshot(AccessSnapshot::default(), governance, providers, audit, config)
    }

    /// Rebuild from persisted state.
    pub fn from_snapshot(
        snapshot: AccessSnapshot,
        governance: Governance,
        providers: Arc<ProviderRegistry>,
        audit: Arc<dyn AuditSink>,
        config: AccessConfig,
    ) -> Self {
        Self {
            governance,
            providers,
            audit,
            config,
            guard: ReentrancyGuard::new(),
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> AccessSnapshot {
        self.read().clone()
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    /// The shared governance handle.
    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    pub fn stage(&self) -> Stage {
        self.governance.stage()
    }

    /// Obtain a witness for a governance-gated mutation.
    pub fn authorize(&self, caller: Address) -> Result<GovernanceWitness> {
        Ok(self.governance.authorize(caller)?)
    }

    /// Re-check a witness against the current governance state.
    pub fn confirm(&self, witness: &GovernanceWitness) -> Result<()> {
        Ok(self.governance.confirm(witness)?)
    }

    /// `Bootstrap -> Multisig`.
    pub fn promote_to_multisig(&self, caller: Address, multisig: Address, now: i64) -> Result<StageTransition> {
        let transition = self
            .governance
            .update(|g| g.promote_to_multisig(caller, multisig, now))?;
        self.record_transition(&transition);
        Ok(transition)
    }

    /// `Multisig -> Dao`.
    pub fn promote_to_dao(&self, caller: Address, dao: Address, now: i64) -> Result<StageTransition> {
        let transition = self.governance.update(|g| g.promote_to_dao(caller, dao, now))?;
        self.record_transition(&transition);
        Ok(transition)
    }

    /// `Dao -> Ossified`. Irreversible.
    ///
    /// Refused while paused: an ossified system can never be unpaused.
    pub fn ossify(&self, caller: Address, now: i64) -> Result<StageTransition> {
        let transition = {
            // Held across the transition so the pause flag cannot change underneath.
            let state = self.write();
            self.governance.update(|g| {
                if state.paused && g.stage() == Stage::Dao && g.authorize(caller).is_ok() {
                    return Ok(None);
                }
                g.ossify(caller, now).map(Some)
            })?
        }
        .ok_or(AccessError::SystemPaused)?;
        self.record_transition(&transition);
        Ok(transition)
    }

    fn record_transition(&self, transition: &StageTransition) {
        tracing::info!(
            from = ?transition.from,
            to = ?transition.to,
            by = %transition.by,
            "governance transition"
        );
        self.audit
            .record(AuditEvent::GovernanceTransition(transition.clone()));
    }

    pub fn is_paused(&self) -> bool {
        self.read().paused
    }

    /// Disable capability verification entirely.
    pub fn pause(&self, witness: &GovernanceWitness, now: i64) -> Result<()> {
        self.set_paused(witness, true, now)
    }

    pub fn unpause(&self, witness: &GovernanceWitness, now: i64) -> Result<()> {
        self.set_paused(witness, false, now)
    }

    fn set_paused(&self, witness: &GovernanceWitness, paused: bool, now: i64) -> Result<()> {
        {
            let mut state = self.write();
            self.governance.confirm(witness)?;
            if state.paused == paused {
                return Err(AccessError::PauseUnchanged(paused));
            }
            state.paused = paused;
        }
        tracing::info!(paused, by = %witness.actor(), "pause state changed");
        self.audit.record(AuditEvent::PauseChanged {
            paused,
            by: witness.actor(),
            at: now,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Provider selection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn default_provider(&self) -> Option<ModuleId> {
        self.read().default_provider
    }

    pub fn subject_provider(&self, subject: &SubjectId) -> Option<ModuleId> {
        self.read().subject_providers.get(subject).copied()
    }

    /// The per-subject override if set, else the default.
    pub fn effective_provider(&self, subject: &SubjectId) -> Option<ModuleId> {
        effective(&self.read(), subject)
    }

    /// Set the provider used for subjects without an override.
    pub fn set_default_provider(&self, witness: &GovernanceWitness, id: ModuleId) -> Result<()> {
        self.governance.confirm(witness)?;
        self.validate_provider(&id)?;
        let previous = {
            let mut state = self.write();
            // Again under the lock: ossify holds it across the transition.
            self.governance.confirm(witness)?;
            state.default_provider.replace(id)
        };
        tracing::info!(provider = %id, by = %witness.actor(), "default provider set");
        self.audit.record(AuditEvent::DefaultProviderChanged {
            previous,
            current: id,
            by: witness.actor(),
        });
        Ok(())
    }

    /// Set or clear a subject's provider override.
    ///
    /// Does not check that `by` owns `subject`; the subject registry performs
    /// that check before calling.
    pub fn set_subject_provider(
        &self,
        subject: SubjectId,
        provider: Option<ModuleId>,
        by: Address,
    ) -> Result<()> {
        if let Some(id) = &provider {
            self.validate_provider(id)?;
        }
        {
            let mut state = self.write();
            match provider {
                Some(id) => state.subject_providers.insert(subject, id),
                None => state.subject_providers.remove(&subject),
            };
        }
        self.audit.record(AuditEvent::SubjectProviderChanged {
            subject,
            provider,
            by,
        });
        Ok(())
    }

    /// A provider may be selected only if registered, active and unchanged.
    fn validate_provider(&self, id: &ModuleId) -> Result<()> {
        let record = self.providers.get_info(id)?;
        if !record.active {
            return Err(AccessError::ProviderInactive(*id));
        }
        if !self.providers.verify_integrity(id)? {
            return Err(AccessError::ProviderIdentityChanged(*id));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Read-only capability check: no guard, no audit record.
    pub fn check_capability(&self, request: &AccessRequest<'_>, now: i64) -> Result<Capabilities> {
        self.evaluate(request, now).map(|(_, granted)| granted)
    }

    /// Verify a capability for a state-changing operation.
    ///
    /// Guarded per subject and recorded in the audit trail on success.
    pub fn verify_capability(&self, request: &AccessRequest<'_>, now: i64) -> Result<Capabilities> {
        let _ticket = self
            .guard
            .enter(GuardScope::Subject("verify_capability", request.subject))?;
        self.verify_and_record(request, now)
    }

    /// Run `body` only after `request` verifies.
    ///
    /// The subject stays guarded until `body` returns, so neither the
    /// provider nor the body can re-enter a guarded operation on it.
    pub fn guarded<T, E, F>(&self, request: &AccessRequest<'_>, now: i64, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Capabilities) -> std::result::Result<T, E>,
        E: From<AccessError>,
    {
        let _ticket = self
            .guard
            .enter(GuardScope::Subject("guarded", request.subject))
            .map_err(AccessError::from)?;
        let granted = self.verify_and_record(request, now)?;
        body(granted)
    }

    fn verify_and_record(&self, request: &AccessRequest<'_>, now: i64) -> Result<Capabilities> {
        let (provider, granted) = self.evaluate(request, now)?;
        tracing::debug!(
            principal = %request.principal,
            subject = %request.subject,
            required = %request.required,
            %provider,
            "capability verified"
        );
        self.audit.record(AuditEvent::CapabilityVerified {
            principal: request.principal,
            subject: request.subject,
            capabilities: request.required,
            provider,
            proof_digest: Blake3Hash::hash(request.proof),
            at: now,
        });
        Ok(granted)
    }

    /// The verification pipeline. Performs no mutation.
    fn evaluate(&self, request: &AccessRequest<'_>, now: i64) -> Result<(ModuleId, Capabilities)> {
        let provider_id = {
            let state = self.read();
            if state.paused {
                return Err(AccessError::SystemPaused);
            }
            effective(&state, &request.subject)
        }
        .ok_or(AccessError::ProviderUnavailable { provider: None })?;

        let provider = self.providers.lookup(&provider_id).ok_or_else(|| {
            tracing::warn!(provider = %provider_id, subject = %request.subject, "provider unavailable");
            AccessError::ProviderUnavailable {
                provider: Some(provider_id),
            }
        })?;

        let mut meter = ResourceMeter::new(self.config.provider_budget);
        let (verified, granted) = {
            let mut ctx = CallContext::new(now, &mut meter);
            provider.verify_capabilities(
                request.proof,
                request.principal,
                request.subject,
                request.required,
                &mut ctx,
            )
        };
        if meter.is_exhausted() {
            tracing::warn!(provider = %provider_id, limit = meter.limit(), "provider exceeded budget");
            return Err(AccessError::ResourceExceeded {
                provider: provider_id,
                limit: meter.limit(),
            });
        }

        if !verified || !capability::has_capability(granted, request.required) {
            tracing::debug!(
                principal = %request.principal,
                subject = %request.subject,
                required = %request.required,
                verified,
                "capability denied"
            );
            return Err(AccessError::CapabilityDenied {
                principal: request.principal,
                subject: request.subject,
                required: request.required,
                granted: if verified { granted } else { Capabilities::NONE },
            });
        }

        Ok((provider_id, granted))
    }

    fn read(&self) -> RwLockReadGuard<'_, AccessSnapshot> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AccessSnapshot> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn effective(state: &AccessSnapshot, subject: &SubjectId) -> Option<ModuleId> {
    state
        .subject_providers
        .get(subject)
        .copied()
        .or(state.default_provider)
}
