//! # Attest Kernel
//!
//! The unified API for the attestation kernel: capability checks routed
//! through pluggable providers, subjects with composed resolvers, executor
//! delegation and staged governance.
//!
//! ## Overview
//!
//! - **Providers** verify caller-supplied proofs and report granted
//!   capabilities. The provider for a subject is its override, if the owner
//!   set one, else the governance default.
//! - **Resolvers** are service extensions attached to a subject. The primary
//!   resolver's hooks are blocking; additional resolvers are best-effort.
//! - **Executors** are delegates who may transfer a subject or associate a
//!   module on the owner's behalf.
//! - **Governance** moves one way through `Bootstrap -> Multisig -> Dao ->
//!   Ossified`. Once ossified, nothing governance-gated can change.
//!
//! Every module registry pins the fingerprint of the code it registered. A
//! module whose code was swapped behind its reference stops resolving
//! instead of running the new code.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use attest_kernel::access::{AttestationProvider, ProofVerifier};
//! use attest_kernel::core::{Address, Blake3Hash, MemoryAuditLog, SubjectId, SystemClock};
//! use attest_kernel::registry::CodeTable;
//! use attest_kernel::{DocumentResolver, Executor, Kernel, KernelConfig, KernelHosts, NewSubject};
//!
//! let governor = Address::derive("governor");
//! let hosts = KernelHosts {
//!     providers: Arc::new(CodeTable::<dyn AttestationProvider>::new()),
//!     verifiers: Arc::new(CodeTable::<dyn ProofVerifier>::new()),
//!     resolvers: Arc::new(CodeTable::<dyn DocumentResolver>::new()),
//!     executors: Arc::new(CodeTable::<dyn Executor>::new()),
//! };
//! let kernel = Kernel::new(
//!     governor,
//!     hosts,
//!     KernelConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(MemoryAuditLog::default()),
//! );
//!
//! let alice = Address::derive("alice");
//! let doc = NewSubject::new(SubjectId::derive("contract-42"), Blake3Hash::hash(b"contents"));
//! kernel.register_subject(alice, doc).unwrap();
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `attest_kernel::core` - Identities, capabilities, governance, audit
//! - `attest_kernel::registry` - Integrity-checked module registries
//! - `attest_kernel::access` - Providers, verifiers and access control
//! - `attest_kernel::store` - Storage abstraction and SQLite

pub mod config;
pub mod error;
pub mod executor;
pub mod kernel;
pub mod persist;
pub mod resolver;
pub mod subject;

// Re-export component crates
pub use attest_kernel_access as access;
pub use attest_kernel_core as core;
pub use attest_kernel_registry as registry;
pub use attest_kernel_store as store;

// Re-export main types for convenience
pub use config::{KernelConfig, ResolverBudgets, MAX_ADDITIONAL_RESOLVERS};
pub use error::{KernelError, Result};
pub use executor::{check_executor, Executor, ExecutorCheck};
pub use kernel::{Kernel, KernelHosts};
pub use resolver::{invoke_hook, DocumentResolver, HookFailure, ResolverFault, ResolverRegistry};
pub use subject::{ExecutorDelegation, NewSubject, SubjectRecord, UnlockRecord};

// Re-export commonly used core types
pub use attest_kernel_access::{AccessConfig, AccessRequest};
pub use attest_kernel_core::{
    Address, Capabilities, ErrorKind, GovernanceWitness, ModuleId, Stage, SubjectId,
};
