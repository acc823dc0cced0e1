//! Reentrancy guards for entry points that make external calls.
//!
//! A guarded entry point holds a [`GuardTicket`] for the duration of the
//! call, external calls included. Any attempt to enter the same scope
//! before the ticket drops fails immediately instead of blocking.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::types::SubjectId;

/// The scope a guard covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardScope {
    /// One entry point, across all subjects.
    Global(&'static str),
    /// One subject, across all entry points that share the name.
    Subject(&'static str, SubjectId),
}

/// Tracks which scopes are currently in flight.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    active: Mutex<HashSet<GuardScope>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `scope`, failing if it is already entered.
    pub fn enter(&self, scope: GuardScope) -> Result<GuardTicket<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(scope) {
            return Err(CoreError::Reentrant(format!("{:?}", scope)));
        }
        Ok(GuardTicket { guard: self, scope })
    }

    pub fn is_active(&self, scope: &GuardScope) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(scope)
    }
}

/// Releases its scope when dropped.
#[derive(Debug)]
pub struct GuardTicket<'a> {
    guard: &'a ReentrancyGuard,
    scope: GuardScope,
}

impl GuardTicket<'_> {
    pub fn scope(&self) -> GuardScope {
        self.scope
    }
}

impl Drop for GuardTicket<'_> {
    fn drop(&mut self) {
        self.guard
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentry_rejected_until_release() {
        let guard = ReentrancyGuard::new();
        let scope = GuardScope::Subject("transfer", SubjectId::derive("doc"));

        let ticket = guard.enter(scope).unwrap();
        assert!(guard.is_active(&scope));
        assert!(matches!(guard.enter(scope), Err(CoreError::Reentrant(_))));

        drop(ticket);
        assert!(!guard.is_active(&scope));
        assert!(guard.enter(scope).is_ok());
    }

    #[test]
    fn test_scopes_are_independent() {
        let guard = ReentrancyGuard::new();
        let _a = guard.enter(GuardScope::Subject("transfer", SubjectId::derive("a"))).unwrap();
        let _b = guard.enter(GuardScope::Subject("transfer", SubjectId::derive("b"))).unwrap();
        let _c = guard.enter(GuardScope::Global("verify")).unwrap();
        assert!(guard.enter(GuardScope::Global("verify")).is_err());
    }
}
