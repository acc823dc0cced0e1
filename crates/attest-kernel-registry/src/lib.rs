//! # Attest Kernel Registry
//!
//! Registries of pluggable modules that notice when a module's code has been
//! silently replaced.
//!
//! ## Overview
//!
//! A module is registered under a [`ModuleId`](attest_kernel_core::ModuleId)
//! and points at code deployed at an
//! [`Address`](attest_kernel_core::Address). At registration the registry
//! captures the code's [`Fingerprint`](attest_kernel_core::Fingerprint).
//! Every [`IntegrityRegistry::lookup`] recomputes the fingerprint and
//! returns `None` when it no longer matches, when the module is inactive, or
//! when the id is unknown. It never errors for these cases: one compromised
//! module must not turn into a denial of service for every caller.
//!
//! The same registry type is instantiated once per module kind (attestation
//! providers, proof verifiers, document resolvers).
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use attest_kernel_core::{Address, Governance, MemoryAuditLog, ModuleId};
//! use attest_kernel_registry::{CodeTable, IntegrityRegistry};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> &'static str;
//! }
//! struct Hello;
//! impl Greeter for Hello {
//!     fn greet(&self) -> &'static str { "hello" }
//! }
//!
//! let host: Arc<CodeTable<dyn Greeter>> = Arc::new(CodeTable::new());
//! let reference = Address::derive("greeter-v1");
//! host.deploy(reference, b"greeter code v1".to_vec(), Arc::new(Hello));
//!
//! let governor = Address::derive("governor");
//! let governance = Governance::new(governor);
//! let registry = IntegrityRegistry::new(
//!     "greeter",
//!     host.clone(),
//!     governance.clone(),
//!     Arc::new(MemoryAuditLog::default()),
//! );
//! let witness = governance.authorize(governor).unwrap();
//!
//! let id = ModuleId::derive("greeter");
//! registry.register(&witness, id, reference, "greeter", "says hello", 0).unwrap();
//! assert!(registry.lookup(&id).is_some());
//!
//! // Retarget the code behind the address: lookups now degrade to None.
//! host.deploy(reference, b"greeter code v2".to_vec(), Arc::new(Hello));
//! assert!(registry.lookup(&id).is_none());
//! ```

pub mod error;
pub mod host;
pub mod record;
pub mod registry;

pub use error::{RegistryError, Result};
pub use host::{CodeTable, ModuleHost};
pub use record::{ModuleRecord, Page};
pub use registry::{IntegrityRegistry, MAX_PAGE_SIZE};
