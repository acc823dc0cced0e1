//! Append-only audit trail.
//!
//! Components report what they did through an [`AuditSink`]. The sink is
//! decoupled from control flow: recording never fails and never influences
//! the operation that produced the event. Tests assert on
//! [`MemoryAuditLog`]; deployments forward to [`TracingAuditSink`] or their
//! own sink.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::capability::Capabilities;
use crate::crypto::{Blake3Hash, Fingerprint};
use crate::governance::StageTransition;
use crate::types::{Address, ModuleId, SubjectId};

/// Lifecycle hook on a document resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverHook {
    Registered,
    OwnershipTransferred,
    ModuleAssociated,
    CanOwnDocument,
}

impl fmt::Display for ResolverHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverHook::Registered => "on_registered",
            ResolverHook::OwnershipTransferred => "on_ownership_transferred",
            ResolverHook::ModuleAssociated => "on_module_associated",
            ResolverHook::CanOwnDocument => "can_own_document",
        };
        f.write_str(name)
    }
}

/// Something worth keeping a record of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    // ─────────────────────────────────────────────────────────────────────────
    // Integrity registries
    // ─────────────────────────────────────────────────────────────────────────
    ModuleRegistered {
        registry: &'static str,
        id: ModuleId,
        reference: Address,
        fingerprint: Fingerprint,
        module_type: String,
        by: Address,
        at: i64,
    },
    ModuleDeactivated {
        registry: &'static str,
        id: ModuleId,
        by: Address,
        at: i64,
    },
    ModuleReactivated {
        registry: &'static str,
        id: ModuleId,
        by: Address,
        at: i64,
    },
    ModuleMetadataUpdated {
        registry: &'static str,
        id: ModuleId,
        module_type: String,
        description: String,
        by: Address,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Access control
    // ─────────────────────────────────────────────────────────────────────────
    CapabilityVerified {
        principal: Address,
        subject: SubjectId,
        capabilities: Capabilities,
        provider: ModuleId,
        proof_digest: Blake3Hash,
        at: i64,
    },
    DefaultProviderChanged {
        previous: Option<ModuleId>,
        current: ModuleId,
        by: Address,
    },
    SubjectProviderChanged {
        subject: SubjectId,
        provider: Option<ModuleId>,
        by: Address,
    },
    GovernanceTransition(StageTransition),
    PauseChanged {
        paused: bool,
        by: Address,
        at: i64,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Subjects
    // ─────────────────────────────────────────────────────────────────────────
    SubjectRegistered {
        subject: SubjectId,
        owner: Address,
        at: i64,
    },
    OwnershipTransferred {
        subject: SubjectId,
        previous: Address,
        owner: Address,
        by: Address,
        at: i64,
    },
    ModuleAssociated {
        subject: SubjectId,
        module: Address,
        by: Address,
    },
    PrimaryResolverChanged {
        subject: SubjectId,
        resolver: Option<ModuleId>,
        by: Address,
    },
    AdditionalResolverAdded {
        subject: SubjectId,
        resolver: ModuleId,
        by: Address,
    },
    AdditionalResolverRemoved {
        subject: SubjectId,
        resolver: ModuleId,
        by: Address,
    },
    ResolversLocked {
        subject: SubjectId,
        by: Address,
        at: i64,
    },
    EmergencyUnlocked {
        subject: SubjectId,
        by: Address,
        justification: String,
        at: i64,
    },
    /// A resolver hook was unavailable, failed, or ran over budget.
    ///
    /// `blocking` distinguishes a primary failure (the operation was
    /// aborted) from an additional one (recorded and ignored).
    ResolverCallFailed {
        subject: SubjectId,
        resolver: ModuleId,
        hook: ResolverHook,
        blocking: bool,
        reason: String,
    },
    ResolverBudgetChanged {
        resolver: ModuleId,
        budget: Option<u64>,
        by: Address,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Executors
    // ─────────────────────────────────────────────────────────────────────────
    ExecutorAuthorized {
        subject: SubjectId,
        executor: Address,
        by: Address,
    },
    ExecutorRevoked {
        subject: SubjectId,
        executor: Address,
        by: Address,
    },
    ExecutorReplaced {
        subject: SubjectId,
        previous: Address,
        current: Address,
        by: Address,
    },
    ExecutorWhitelistChanged {
        executor: Address,
        whitelisted: bool,
        by: Address,
    },
}

/// An event with its position in the trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub seq: u64,
    pub event: AuditEvent,
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory audit trail.
///
/// Once full, the oldest records are dropped. Sequence numbers keep
/// increasing, so a gap at the front shows how much was dropped.
#[derive(Debug)]
pub struct MemoryAuditLog {
    capacity: usize,
    inner: Mutex<MemoryAuditInner>,
}

#[derive(Debug, Default)]
struct MemoryAuditInner {
    records: VecDeque<AuditRecord>,
    next_seq: u64,
}

impl MemoryAuditLog {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(MemoryAuditInner::default()),
        }
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().records.iter().map(|r| r.event.clone()).collect()
    }

    /// Retained events matching a predicate.
    pub fn matching<F>(&self, mut predicate: F) -> Vec<AuditEvent>
    where
        F: FnMut(&AuditEvent) -> bool,
    {
        self.lock()
            .records
            .iter()
            .filter(|r| predicate(&r.event))
            .map(|r| r.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of events ever recorded, including dropped ones.
    pub fn total_recorded(&self) -> u64 {
        self.lock().next_seq
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryAuditInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.records.len() == self.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(AuditRecord { seq, event });
    }
}

/// Forwards audit events to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(target: "attest_kernel::audit", ?event, "audit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(at: i64) -> AuditEvent {
        AuditEvent::PauseChanged {
            paused: true,
            by: Address::ZERO,
            at,
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let log = MemoryAuditLog::new(2);
        log.record(paused(1));
        log.record(paused(2));
        log.record(paused(3));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, 1);
        assert_eq!(records[1].event, paused(3));
        assert_eq!(log.total_recorded(), 3);
    }

    #[test]
    fn test_matching() {
        let log = MemoryAuditLog::default();
        log.record(paused(1));
        log.record(AuditEvent::ResolversLocked {
            subject: SubjectId::ZERO,
            by: Address::ZERO,
            at: 2,
        });

        let locked = log.matching(|e| matches!(e, AuditEvent::ResolversLocked { .. }));
        assert_eq!(locked.len(), 1);
        assert!(!log.is_empty());
    }

    #[test]
    fn test_hook_display() {
        assert_eq!(ResolverHook::CanOwnDocument.to_string(), "can_own_document");
    }
}
