//! # Attest Kernel Core
//!
//! Pure primitives for the attestation kernel: identities, the capability
//! namespace, the governance stage machine, resource metering and the audit
//! trail.
//!
//! This crate performs no I/O. Everything here is either a value type or a
//! small piece of interior-mutable bookkeeping (guards, audit buffers) that
//! the higher crates share.
//!
//! ## Key Types
//!
//! - [`Capabilities`] - Fixed-width permission bitmask with an admin override bit
//! - [`GovernanceState`] - One-way `Bootstrap -> Multisig -> Dao -> Ossified` machine
//! - [`Governance`] - Shared handle every governance-gated component confirms against
//! - [`GovernanceWitness`] - Proof that a caller currently holds governance authority
//! - [`Fingerprint`] - Content identity of a deployed module (Blake3)
//! - [`ResourceMeter`] - Budget for a single external call
//! - [`AuditSink`] - Append-only audit trail
//!
//! ## Capability Checks
//!
//! ```rust
//! use attest_kernel_core::{capability, Capabilities};
//!
//! let granted = Capabilities::PARTICIPANT;
//! assert!(capability::has_capability(granted, Capabilities::CLAIM));
//! assert!(!capability::has_capability(granted, Capabilities::UPDATE));
//!
//! // The admin bit satisfies every requirement.
//! assert!(capability::has_capability(Capabilities::ADMIN, Capabilities::UPDATE));
//! ```

pub mod audit;
pub mod capability;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod governance;
pub mod guard;
pub mod meter;
pub mod types;

pub use audit::{AuditEvent, AuditRecord, AuditSink, MemoryAuditLog, ResolverHook, TracingAuditSink};
pub use capability::Capabilities;
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{Blake3Hash, Fingerprint, Keypair, PublicKey, Signature};
pub use error::{CoreError, ErrorKind, GovernanceError, Result};
pub use governance::{Governance, GovernanceState, GovernanceWitness, Stage, StageTransition};
pub use guard::{GuardScope, GuardTicket, ReentrancyGuard};
pub use meter::{CallContext, ResourceMeter};
pub use types::{Address, ModuleId, SubjectId};
