//! Executor delegation.
//!
//! An executor is a delegate the owner allows to act on their behalf for
//! transfers and module association. It is a weak, revocable relation, not
//! ownership.

use std::sync::Arc;

use attest_kernel_core::{Address, CallContext, ResourceMeter, SubjectId};
use attest_kernel_registry::ModuleHost;

/// Interface a module must implement to act as an executor.
pub trait Executor: Send + Sync {
    /// Whether this module agrees to act for `owner` on `subject`.
    fn accepts_delegation(&self, subject: SubjectId, owner: Address, ctx: &mut CallContext<'_>) -> bool;
}

/// How a prospective executor was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorCheck {
    /// Whitelisted by governance; not probed.
    Whitelisted,
    /// A plain identity with no deployed code.
    PlainIdentity,
    /// A module that accepted the delegation.
    AcceptingModule,
    /// A module that refused, could not be loaded, or ran over budget.
    Refused,
}

impl ExecutorCheck {
    pub fn is_accepted(self) -> bool {
        !matches!(self, ExecutorCheck::Refused)
    }
}

/// Decide whether `candidate` may become the executor of `subject`.
pub fn check_executor(
    host: &Arc<dyn ModuleHost<dyn Executor>>,
    whitelisted: bool,
    candidate: &Address,
    subject: SubjectId,
    owner: Address,
    budget: u64,
    now: i64,
) -> ExecutorCheck {
    if whitelisted {
        return ExecutorCheck::Whitelisted;
    }
    if !host.is_module(candidate) {
        return ExecutorCheck::PlainIdentity;
    }
    let Some(module) = host.load(candidate) else {
        return ExecutorCheck::Refused;
    };

    let mut meter = ResourceMeter::new(budget);
    let accepted = {
        let mut ctx = CallContext::new(now, &mut meter);
        module.accepts_delegation(subject, owner, &mut ctx)
    };
    if accepted && !meter.is_exhausted() {
        ExecutorCheck::AcceptingModule
    } else {
        ExecutorCheck::Refused
    }
}
