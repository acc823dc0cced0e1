//! Snapshot and restore of kernel state through a [`StateStore`].
//!
//! A snapshot is taken under read locks and written as a single
//! [`WriteBatch`] that first clears every namespace it owns, so the store
//! always holds one complete snapshot. Registry fingerprints are restored as
//! stored and never recomputed: code swapped while the kernel was offline
//! is still caught on the next lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use attest_kernel_access::{AccessControl, AccessSnapshot, ProviderRegistry, VerifierRegistry};
use attest_kernel_core::{Address, AuditSink, Clock, Governance, GovernanceState, ModuleId, SubjectId};
use attest_kernel_registry::{IntegrityRegistry, ModuleHost, ModuleRecord};
use attest_kernel_store::{Namespace, StateStore, StateStoreExt, WriteBatch};

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::kernel::{Kernel, KernelHosts, SubjectState};
use crate::resolver::ResolverRegistry;
use crate::subject::{ExecutorDelegation, SubjectRecord, UnlockRecord};

const PROVIDERS: &str = "provider";
const VERIFIERS: &str = "verifier";
const RESOLVERS: &str = "resolver";

const GOVERNANCE_KEY: &[u8] = b"state";
const DEFAULT_PROVIDER_KEY: &[u8] = b"default_provider";
const PAUSED_KEY: &[u8] = b"paused";
const EMERGENCY_KEY: &[u8] = b"emergency";

impl Kernel {
    /// Write a consistent snapshot of the whole kernel to `store`.
    pub async fn persist(&self, store: &dyn StateStore) -> Result<()> {
        let batch = self.snapshot_batch()?;
        let ops = batch.len();
        store.apply_batch(batch).await?;
        tracing::info!(ops, "kernel state persisted");
        Ok(())
    }

    /// Rebuild a kernel from `store`, binding its registries to `hosts`.
    ///
    /// The emergency actor and expiry come from the store, not from
    /// `config`: they are fixed when the kernel is first created.
    pub async fn restore(
        store: &dyn StateStore,
        hosts: KernelHosts,
        mut config: KernelConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let governance = store
            .get_value::<GovernanceState>(&Namespace::Governance, GOVERNANCE_KEY)
            .await?
            .map(Governance::from_state)
            .ok_or_else(|| KernelError::Corrupt("missing governance state".into()))?;
        let default_provider = store
            .get_value::<Option<ModuleId>>(&Namespace::Governance, DEFAULT_PROVIDER_KEY)
            .await?
            .flatten();
        let paused = store
            .get_value::<bool>(&Namespace::Governance, PAUSED_KEY)
            .await?
            .unwrap_or(false);
        let subject_providers: BTreeMap<SubjectId, ModuleId> =
            keyed(store.scan_values::<ModuleId>(&Namespace::ProviderOverride).await?)?
                .into_iter()
                .collect();

        if let Some((actor, expiry)) = store
            .get_value::<(Option<Address>, i64)>(&Namespace::Settings, EMERGENCY_KEY)
            .await?
        {
            config.emergency_actor = actor;
            config.emergency_expiry = expiry;
        }

        let providers: Arc<ProviderRegistry> = Arc::new(
            load_registry(store, PROVIDERS, hosts.providers, &governance, audit.clone()).await?,
        );
        let verifiers: Arc<VerifierRegistry> = Arc::new(
            load_registry(store, VERIFIERS, hosts.verifiers, &governance, audit.clone()).await?,
        );
        let resolvers: Arc<ResolverRegistry> = Arc::new(
            load_registry(store, RESOLVERS, hosts.resolvers, &governance, audit.clone()).await?,
        );

        let access = AccessControl::from_snapshot(
            AccessSnapshot {
                default_provider,
                subject_providers,
                paused,
            },
            governance,
            providers,
            audit.clone(),
            config.access.clone(),
        );

        let mut state = SubjectState::default();
        for record in values::<SubjectRecord>(store, &Namespace::Subject).await? {
            if state.subjects.insert(record.id, record.clone()).is_some() {
                return Err(KernelError::Corrupt(format!("duplicate subject {}", record.id)));
            }
            state.order.push(record.id);
        }
        let executors: Vec<(SubjectId, ExecutorDelegation)> =
            keyed(store.scan_values::<ExecutorDelegation>(&Namespace::Executor).await?)?;
        state.executors = executors.into_iter().collect::<HashMap<_, _>>();
        for (key, _) in store.scan(&Namespace::ExecutorWhitelist).await? {
            state.whitelist.insert(parse_key::<Address>(&key)?);
        }
        state.budgets = keyed::<ModuleId, u64>(store.scan_values::<u64>(&Namespace::ResolverBudget).await?)?
            .into_iter()
            .collect();
        state.unlocks = values::<UnlockRecord>(store, &Namespace::UnlockHistory).await?;

        tracing::info!(
            subjects = state.order.len(),
            stage = ?access.stage(),
            "kernel state restored"
        );
        Ok(Kernel::assemble(
            access,
            verifiers,
            resolvers,
            hosts.executors,
            state,
            config,
            clock,
            audit,
        ))
    }

    fn snapshot_batch(&self) -> Result<WriteBatch> {
        let mut batch = WriteBatch::new();

        for (kind, records) in [
            (PROVIDERS, self.providers().records()),
            (VERIFIERS, self.verifiers.records()),
            (RESOLVERS, self.resolvers.records()),
        ] {
            let ns = Namespace::registry(kind);
            batch.clear(ns.clone());
            for (index, record) in records.iter().enumerate() {
                batch.put_value(ns.clone(), index_key(index), record)?;
            }
        }

        let access = self.access.snapshot();
        batch.clear(Namespace::Governance);
        batch.put_value(
            Namespace::Governance,
            GOVERNANCE_KEY,
            &self.access.governance().snapshot(),
        )?;
        batch.put_value(Namespace::Governance, DEFAULT_PROVIDER_KEY, &access.default_provider)?;
        batch.put_value(Namespace::Governance, PAUSED_KEY, &access.paused)?;
        batch.clear(Namespace::ProviderOverride);
        for (subject, provider) in &access.subject_providers {
            batch.put_value(Namespace::ProviderOverride, subject.as_bytes().to_vec(), provider)?;
        }

        batch.clear(Namespace::Settings);
        batch.put_value(
            Namespace::Settings,
            EMERGENCY_KEY,
            &(self.config.emergency_actor, self.config.emergency_expiry),
        )?;

        let state = self.read();
        batch.clear(Namespace::Subject);
        for (index, id) in state.order.iter().enumerate() {
            let record = state
                .subjects
                .get(id)
                .ok_or_else(|| KernelError::Corrupt(format!("subject {} missing from index", id)))?;
            batch.put_value(Namespace::Subject, index_key(index), record)?;
        }
        batch.clear(Namespace::Executor);
        for (subject, delegation) in &state.executors {
            batch.put_value(Namespace::Executor, subject.as_bytes().to_vec(), delegation)?;
        }
        batch.clear(Namespace::ExecutorWhitelist);
        for executor in &state.whitelist {
            batch.put(Namespace::ExecutorWhitelist, executor.as_bytes().to_vec(), Vec::new());
        }
        batch.clear(Namespace::ResolverBudget);
        for (resolver, budget) in &state.budgets {
            batch.put_value(Namespace::ResolverBudget, resolver.as_bytes().to_vec(), budget)?;
        }
        batch.clear(Namespace::UnlockHistory);
        for (index, unlock) in state.unlocks.iter().enumerate() {
            batch.put_value(Namespace::UnlockHistory, index_key(index), unlock)?;
        }

        Ok(batch)
    }
}

async fn load_registry<M: ?Sized + 'static>(
    store: &dyn StateStore,
    kind: &'static str,
    host: Arc<dyn ModuleHost<M>>,
    governance: &Governance,
    audit: Arc<dyn AuditSink>,
) -> Result<IntegrityRegistry<M>> {
    let records = values::<ModuleRecord>(store, &Namespace::registry(kind)).await?;
    Ok(IntegrityRegistry::from_records(
        kind,
        host,
        governance.clone(),
        audit,
        records,
    )?)
}

/// Values of an index-keyed namespace, in index order.
async fn values<T: DeserializeOwned + Send>(store: &dyn StateStore, namespace: &Namespace) -> Result<Vec<T>> {
    Ok(store
        .scan_values::<T>(namespace)
        .await?
        .into_iter()
        .map(|(_, value)| value)
        .collect())
}

/// Big-endian so that key order is insertion order.
fn index_key(index: usize) -> Vec<u8> {
    (index as u64).to_be_bytes().to_vec()
}

fn parse_key<K>(key: &[u8]) -> Result<K>
where
    K: for<'a> TryFrom<&'a [u8]>,
{
    K::try_from(key).map_err(|_| KernelError::Corrupt(format!("bad key length {}", key.len())))
}

fn keyed<K, V>(entries: Vec<(Vec<u8>, V)>) -> Result<Vec<(K, V)>>
where
    K: for<'a> TryFrom<&'a [u8]>,
{
    entries
        .into_iter()
        .map(|(key, value)| Ok((parse_key(&key)?, value)))
        .collect()
}
