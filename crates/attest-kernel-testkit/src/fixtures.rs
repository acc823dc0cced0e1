//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a kernel on a manual clock with
//! in-memory module hosts and an inspectable audit log.

use std::sync::Arc;

use attest_kernel::{
    DocumentResolver, Executor, Kernel, KernelConfig, KernelHosts, NewSubject, Result,
};
use attest_kernel_access::{AttestationProvider, ProofVerifier};
use attest_kernel_core::{
    Address, Blake3Hash, GovernanceWitness, ManualClock, MemoryAuditLog, ModuleId, SubjectId,
};
use attest_kernel_registry::CodeTable;
use attest_kernel_store::StateStore;

/// Fixture start time (Unix ms).
pub const GENESIS: i64 = 1_700_000_000_000;

/// How long the emergency actor may act after genesis.
pub const EMERGENCY_WINDOW: i64 = 30 * 24 * 60 * 60 * 1000;

/// The module hosts behind a kernel, kept concrete so tests can deploy,
/// patch and remove code.
#[derive(Clone)]
pub struct Hosts {
    pub providers: Arc<CodeTable<dyn AttestationProvider>>,
    pub verifiers: Arc<CodeTable<dyn ProofVerifier>>,
    pub resolvers: Arc<CodeTable<dyn DocumentResolver>>,
    pub executors: Arc<CodeTable<dyn Executor>>,
}

impl Hosts {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(CodeTable::new()),
            verifiers: Arc::new(CodeTable::new()),
            resolvers: Arc::new(CodeTable::new()),
            executors: Arc::new(CodeTable::new()),
        }
    }

    pub fn kernel_hosts(&self) -> KernelHosts {
        KernelHosts {
            providers: self.providers.clone(),
            verifiers: self.verifiers.clone(),
            resolvers: self.resolvers.clone(),
            executors: self.executors.clone(),
        }
    }
}

impl Default for Hosts {
    fn default() -> Self {
        Self::new()
    }
}

/// A kernel plus everything a test needs to poke at it.
pub struct TestFixture {
    pub kernel: Arc<Kernel>,
    pub hosts: Hosts,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditLog>,
    pub config: KernelConfig,
    /// Bootstrap governance actor.
    pub governor: Address,
    /// Emergency actor, valid until [`GENESIS`] + [`EMERGENCY_WINDOW`].
    pub emergency: Address,
}

impl TestFixture {
    /// Create a fresh kernel at [`GENESIS`].
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Create with a custom config. The emergency settings are overwritten.
    pub fn with_config(mut config: KernelConfig) -> Self {
        let governor = Address::derive("governor");
        let emergency = Address::derive("emergency");
        config.emergency_actor = Some(emergency);
        config.emergency_expiry = GENESIS + EMERGENCY_WINDOW;

        let hosts = Hosts::new();
        let clock = Arc::new(ManualClock::new(GENESIS));
        let audit = Arc::new(MemoryAuditLog::default());
        let kernel = Arc::new(Kernel::new(
            governor,
            hosts.kernel_hosts(),
            config.clone(),
            clock.clone(),
            audit.clone(),
        ));
        Self {
            kernel,
            hosts,
            clock,
            audit,
            config,
            governor,
            emergency,
        }
    }

    /// A witness for the bootstrap governor.
    pub fn witness(&self) -> GovernanceWitness {
        self.kernel
            .authorize(self.governor)
            .expect("fixture governor is authorized")
    }

    /// Deploy `provider` at an address derived from `label` and register it.
    pub fn install_provider(&self, label: &str, provider: Arc<dyn AttestationProvider>) -> Result<ModuleId> {
        let reference = Address::derive(label);
        self.hosts
            .providers
            .deploy(reference, code_for(label), provider);
        let id = ModuleId::derive(label);
        self.kernel.providers().register(
            &self.witness(),
            id,
            reference,
            "test-provider",
            label,
            self.clock_now(),
        )?;
        Ok(id)
    }

    /// Deploy `verifier` at an address derived from `label` and register it.
    pub fn install_verifier(&self, label: &str, verifier: Arc<dyn ProofVerifier>) -> Result<ModuleId> {
        let reference = Address::derive(label);
        self.hosts
            .verifiers
            .deploy(reference, code_for(label), verifier);
        let id = ModuleId::derive(label);
        self.kernel.verifiers().register(
            &self.witness(),
            id,
            reference,
            "test-verifier",
            label,
            self.clock_now(),
        )?;
        Ok(id)
    }

    /// Deploy `resolver` at an address derived from `label` and register it.
    pub fn install_resolver(&self, label: &str, resolver: Arc<dyn DocumentResolver>) -> Result<ModuleId> {
        let reference = Address::derive(label);
        self.hosts
            .resolvers
            .deploy(reference, code_for(label), resolver);
        let id = ModuleId::derive(label);
        self.kernel.resolvers().register(
            &self.witness(),
            id,
            reference,
            "test-resolver",
            label,
            self.clock_now(),
        )?;
        Ok(id)
    }

    /// Deploy an executor module. Executors are not registered anywhere.
    pub fn deploy_executor(&self, label: &str, executor: Arc<dyn Executor>) -> Address {
        let reference = Address::derive(label);
        self.hosts
            .executors
            .deploy(reference, code_for(label), executor);
        reference
    }

    /// Change the code behind a resolver without telling the registry.
    pub fn swap_resolver_code(&self, label: &str) {
        self.hosts
            .resolvers
            .patch_code(&Address::derive(label), format!("{}-v2", label).into_bytes());
    }

    /// Change the code behind a provider without telling the registry.
    pub fn swap_provider_code(&self, label: &str) {
        self.hosts
            .providers
            .patch_code(&Address::derive(label), format!("{}-v2", label).into_bytes());
    }

    /// Register a plain subject for `owner`.
    pub fn register_subject(&self, owner: Address, label: &str) -> Result<SubjectId> {
        let id = SubjectId::derive(label);
        self.kernel.register_subject(owner, new_subject(label))?;
        Ok(id)
    }

    /// Register a subject whose primary resolver is `primary`.
    pub fn register_with_primary(&self, owner: Address, label: &str, primary: ModuleId) -> Result<SubjectId> {
        let id = SubjectId::derive(label);
        self.kernel
            .register_subject(owner, new_subject(label).primary_resolver(primary))?;
        Ok(id)
    }

    /// Rebuild a kernel from `store` over the same hosts, clock and audit log.
    pub async fn reload(&self, store: &dyn StateStore) -> Result<Kernel> {
        Kernel::restore(
            store,
            self.hosts.kernel_hosts(),
            KernelConfig::default(),
            self.clock.clone(),
            self.audit.clone(),
        )
        .await
    }

    fn clock_now(&self) -> i64 {
        self.kernel.now()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A subject with content derived from `label`.
pub fn new_subject(label: &str) -> NewSubject {
    NewSubject::new(SubjectId::derive(label), Blake3Hash::hash(label.as_bytes()))
}

/// A subject id nobody will ever derive from a label.
pub fn fresh_subject_id() -> SubjectId {
    SubjectId::from_bytes(rand::random())
}

/// Distinct principals for multi-party tests.
pub fn principals(count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| Address::derive(&format!("principal-{}", i)))
        .collect()
}

fn code_for(label: &str) -> Vec<u8> {
    format!("{}-v1", label).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingResolver;

    #[test]
    fn test_fixture_installs_modules() {
        let f = TestFixture::new();
        let id = f
            .install_resolver("audit-trail", Arc::new(RecordingResolver::new()))
            .unwrap();
        assert!(f.kernel.resolvers().is_available(&id));

        f.swap_resolver_code("audit-trail");
        assert!(!f.kernel.resolvers().is_available(&id));
    }

    #[test]
    fn test_principals_are_distinct() {
        let all = principals(4);
        for (i, a) in all.iter().enumerate() {
            assert!(all[i + 1..].iter().all(|b| a != b));
        }
        assert_ne!(fresh_subject_id(), fresh_subject_id());
    }
}
