//! Mock providers, resolvers and executors.
//!
//! Each mock records what it was asked and can be told to fail, veto or
//! burn budget, so tests can drive every failure path of the kernel.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock, Weak};

use attest_kernel::{DocumentResolver, ErrorKind, Executor, Kernel, ResolverFault, SubjectRecord};
use attest_kernel_access::AttestationProvider;
use attest_kernel_core::{Address, CallContext, Capabilities, ResolverHook, SubjectId};

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// A provider that ignores the proof and returns a fixed answer.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    pub verified: bool,
    pub granted: Capabilities,
    /// Units charged per call.
    pub cost: u64,
}

impl FixedProvider {
    pub fn granting(granted: Capabilities) -> Self {
        Self {
            verified: true,
            granted,
            cost: 1,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            verified: false,
            granted: Capabilities::NONE,
            cost: 1,
        }
    }

    pub fn costing(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }
}

impl AttestationProvider for FixedProvider {
    fn verify_capabilities(
        &self,
        _proof: &[u8],
        _principal: Address,
        _subject: SubjectId,
        _required: Capabilities,
        ctx: &mut CallContext<'_>,
    ) -> (bool, Capabilities) {
        if ctx.charge(self.cost).is_err() {
            return (false, Capabilities::NONE);
        }
        (self.verified, self.granted)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolvers
// ─────────────────────────────────────────────────────────────────────────────

/// One observed hook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall {
    pub hook: ResolverHook,
    pub subject: SubjectId,
    /// New owner, candidate owner or module, depending on the hook.
    pub party: Option<Address>,
}

/// A resolver that records every hook call.
#[derive(Debug, Default)]
pub struct RecordingResolver {
    fail_on: HashSet<ResolverHook>,
    vetoed: HashSet<Address>,
    burn: u64,
    calls: Mutex<Vec<HookCall>>,
}

impl RecordingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a fault from `hook`.
    pub fn failing(mut self, hook: ResolverHook) -> Self {
        self.fail_on.insert(hook);
        self
    }

    /// Refuse `candidate` in `can_own_document`.
    pub fn vetoing(mut self, candidate: Address) -> Self {
        self.vetoed.insert(candidate);
        self
    }

    /// Charge `units` on every hook, ignoring the meter's verdict.
    pub fn burning(mut self, units: u64) -> Self {
        self.burn = units;
        self
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, hook: ResolverHook) -> usize {
        self.calls().iter().filter(|c| c.hook == hook).count()
    }

    fn observe(
        &self,
        hook: ResolverHook,
        subject: SubjectId,
        party: Option<Address>,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(HookCall {
                hook,
                subject,
                party,
            });
        let _ = ctx.charge(self.burn);
        if self.fail_on.contains(&hook) {
            return Err(ResolverFault::new(format!("{} refused", hook)));
        }
        Ok(())
    }
}

impl DocumentResolver for RecordingResolver {
    fn on_registered(&self, subject: &SubjectRecord, ctx: &mut CallContext<'_>) -> Result<(), ResolverFault> {
        self.observe(ResolverHook::Registered, subject.id, Some(subject.owner), ctx)
    }

    fn on_ownership_transferred(
        &self,
        subject: SubjectId,
        _previous: Address,
        owner: Address,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        self.observe(ResolverHook::OwnershipTransferred, subject, Some(owner), ctx)
    }

    fn on_module_associated(
        &self,
        subject: SubjectId,
        module: Address,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        self.observe(ResolverHook::ModuleAssociated, subject, Some(module), ctx)
    }

    fn can_own_document(
        &self,
        subject: SubjectId,
        candidate: Address,
        ctx: &mut CallContext<'_>,
    ) -> Result<bool, ResolverFault> {
        self.observe(ResolverHook::CanOwnDocument, subject, Some(candidate), ctx)?;
        Ok(!self.vetoed.contains(&candidate))
    }
}

/// A resolver that calls back into the kernel from `on_ownership_transferred`.
///
/// The kernel handle is bound after construction, since the kernel must
/// exist before anything can call back into it.
#[derive(Default)]
pub struct ReentrantResolver {
    kernel: OnceLock<Weak<Kernel>>,
    observed: Mutex<Option<ErrorKind>>,
}

impl ReentrantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, kernel: Weak<Kernel>) {
        let _ = self.kernel.set(kernel);
    }

    /// The error kind the nested call failed with, if it ran.
    pub fn observed(&self) -> Option<ErrorKind> {
        *self.observed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentResolver for ReentrantResolver {
    fn on_ownership_transferred(
        &self,
        subject: SubjectId,
        _previous: Address,
        owner: Address,
        _ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        let Some(kernel) = self.kernel.get().and_then(Weak::upgrade) else {
            return Ok(());
        };
        // Still the previous owner's subject from the kernel's point of view,
        // so the nested call must be stopped by the guard, not by ownership.
        let previous = kernel
            .subject(&subject)
            .map(|s| s.owner)
            .unwrap_or(owner);
        if let Err(e) = kernel.associate_module(previous, subject, Address::derive("sneaky")) {
            *self.observed.lock().unwrap_or_else(|e| e.into_inner()) = Some(e.kind());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executors
// ─────────────────────────────────────────────────────────────────────────────

/// An executor module that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorModule {
    pub accepts: bool,
}

impl ExecutorModule {
    pub fn accepting() -> Self {
        Self { accepts: true }
    }

    pub fn refusing() -> Self {
        Self { accepts: false }
    }
}

impl Executor for ExecutorModule {
    fn accepts_delegation(&self, _subject: SubjectId, _owner: Address, ctx: &mut CallContext<'_>) -> bool {
        ctx.charge(1).is_ok() && self.accepts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_kernel_core::ResourceMeter;

    #[test]
    fn test_recording_resolver_records_and_vetoes() {
        let blocked = Address::derive("blocked");
        let resolver = RecordingResolver::new()
            .vetoing(blocked)
            .failing(ResolverHook::ModuleAssociated);
        let subject = SubjectId::derive("doc");
        let mut meter = ResourceMeter::new(100);
        let mut ctx = CallContext::new(0, &mut meter);

        assert_eq!(resolver.can_own_document(subject, blocked, &mut ctx), Ok(false));
        assert_eq!(
            resolver.can_own_document(subject, Address::derive("ok"), &mut ctx),
            Ok(true)
        );
        assert!(resolver
            .on_module_associated(subject, Address::derive("m"), &mut ctx)
            .is_err());
        assert_eq!(resolver.count(ResolverHook::CanOwnDocument), 2);
        assert_eq!(resolver.calls().len(), 3);
    }

    #[test]
    fn test_fixed_provider_respects_meter() {
        let provider = FixedProvider::granting(Capabilities::ADMIN).costing(10);
        let mut meter = ResourceMeter::new(5);
        let mut ctx = CallContext::new(0, &mut meter);
        let outcome = provider.verify_capabilities(
            &[],
            Address::derive("a"),
            SubjectId::derive("s"),
            Capabilities::VIEW,
            &mut ctx,
        );
        assert_eq!(outcome, (false, Capabilities::NONE));
    }
}
