//! Document resolvers: service extensions composed onto a subject.
//!
//! A subject has at most one primary resolver, whose hooks are blocking,
//! and a bounded list of additional resolvers, whose hooks are best-effort.
//! Every hook call runs under its own [`ResourceMeter`].

use std::fmt;

use attest_kernel_core::{Address, CallContext, ModuleId, ResourceMeter, SubjectId};
use attest_kernel_registry::IntegrityRegistry;

use crate::subject::SubjectRecord;

/// A failure reported by a resolver hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverFault(pub String);

impl ResolverFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl fmt::Display for ResolverFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle hooks a resolver may implement. Every hook defaults to a no-op.
///
/// Hooks run before the triggering operation commits, so they observe the
/// prospective state, never a half-applied one.
pub trait DocumentResolver: Send + Sync {
    fn on_registered(
        &self,
        _subject: &SubjectRecord,
        _ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        Ok(())
    }

    fn on_ownership_transferred(
        &self,
        _subject: SubjectId,
        _previous: Address,
        _owner: Address,
        _ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        Ok(())
    }

    fn on_module_associated(
        &self,
        _subject: SubjectId,
        _module: Address,
        _ctx: &mut CallContext<'_>,
    ) -> Result<(), ResolverFault> {
        Ok(())
    }

    /// Consulted before a transfer. Only the primary resolver can veto.
    fn can_own_document(
        &self,
        _subject: SubjectId,
        _candidate: Address,
        _ctx: &mut CallContext<'_>,
    ) -> Result<bool, ResolverFault> {
        Ok(true)
    }
}

/// Registry of document resolvers.
pub type ResolverRegistry = IntegrityRegistry<dyn DocumentResolver>;

/// Why a hook call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFailure {
    /// Lookup returned nothing: unknown, inactive or tampered.
    Unavailable,
    /// The resolver reported a fault.
    Failed(String),
    /// The call ran its meter dry.
    OverBudget { limit: u64 },
    /// `can_own_document` said no.
    Rejected,
}

impl From<ResolverFault> for HookFailure {
    fn from(fault: ResolverFault) -> Self {
        HookFailure::Failed(fault.0)
    }
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookFailure::Unavailable => f.write_str("resolver unavailable"),
            HookFailure::Failed(reason) => write!(f, "resolver failed: {}", reason),
            HookFailure::OverBudget { limit } => write!(f, "exceeded budget of {} units", limit),
            HookFailure::Rejected => f.write_str("resolver rejected the candidate owner"),
        }
    }
}

/// Look up `id` and run `call` against it under a fresh `budget`.
///
/// An exhausted meter is a failure even if the hook itself returned `Ok`.
pub fn invoke_hook<F>(
    resolvers: &ResolverRegistry,
    id: &ModuleId,
    budget: u64,
    now: i64,
    call: F,
) -> Result<(), HookFailure>
where
    F: FnOnce(&dyn DocumentResolver, &mut CallContext<'_>) -> Result<(), HookFailure>,
{
    let resolver = resolvers.lookup(id).ok_or(HookFailure::Unavailable)?;
    let mut meter = ResourceMeter::new(budget);
    let outcome = {
        let mut ctx = CallContext::new(now, &mut meter);
        call(&*resolver, &mut ctx)
    };
    if meter.is_exhausted() {
        return Err(HookFailure::OverBudget { limit: budget });
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_kernel_core::{Governance, MemoryAuditLog};
    use attest_kernel_registry::CodeTable;
    use std::sync::Arc;

    struct Burner(u64);

    impl DocumentResolver for Burner {
        fn on_module_associated(
            &self,
            _subject: SubjectId,
            _module: Address,
            ctx: &mut CallContext<'_>,
        ) -> Result<(), ResolverFault> {
            // Swallows the budget error on purpose.
            let _ = ctx.charge(self.0);
            Ok(())
        }

        fn can_own_document(
            &self,
            _subject: SubjectId,
            candidate: Address,
            _ctx: &mut CallContext<'_>,
        ) -> Result<bool, ResolverFault> {
            Ok(candidate != Address::derive("blocked"))
        }
    }

    fn registry_with(resolver: Burner) -> (Arc<CodeTable<dyn DocumentResolver>>, ResolverRegistry, ModuleId) {
        let host: Arc<CodeTable<dyn DocumentResolver>> = Arc::new(CodeTable::new());
        let reference = Address::derive("burner");
        host.deploy(reference, b"burner".to_vec(), Arc::new(resolver));
        let governor = Address::derive("governor");
        let governance = Governance::new(governor);
        let registry = ResolverRegistry::new(
            "resolver",
            host.clone(),
            governance.clone(),
            Arc::new(MemoryAuditLog::default()),
        );
        let w = governance.authorize(governor).unwrap();
        let id = ModuleId::derive("burner");
        registry.register(&w, id, reference, "test", "burns units", 0).unwrap();
        (host, registry, id)
    }

    fn associate(registry: &ResolverRegistry, id: &ModuleId, budget: u64) -> Result<(), HookFailure> {
        invoke_hook(registry, id, budget, 0, |r, ctx| {
            Ok(r.on_module_associated(SubjectId::derive("doc"), Address::derive("m"), ctx)?)
        })
    }

    #[test]
    fn test_within_budget() {
        let (_, registry, id) = registry_with(Burner(10));
        assert_eq!(associate(&registry, &id, 10), Ok(()));
    }

    #[test]
    fn test_swallowed_overrun_still_fails() {
        let (_, registry, id) = registry_with(Burner(11));
        assert_eq!(associate(&registry, &id, 10), Err(HookFailure::OverBudget { limit: 10 }));
    }

    #[test]
    fn test_unavailable() {
        let (host, registry, id) = registry_with(Burner(0));
        host.patch_code(&Address::derive("burner"), b"other".to_vec());
        assert_eq!(associate(&registry, &id, 10), Err(HookFailure::Unavailable));
    }

    #[test]
    fn test_veto() {
        let (_, registry, id) = registry_with(Burner(0));
        let outcome = invoke_hook(&registry, &id, 10, 0, |r, ctx| {
            match r.can_own_document(SubjectId::derive("doc"), Address::derive("blocked"), ctx)? {
                true => Ok(()),
                false => Err(HookFailure::Rejected),
            }
        });
        assert_eq!(outcome, Err(HookFailure::Rejected));
    }
}
