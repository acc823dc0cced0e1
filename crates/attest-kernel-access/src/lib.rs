//! # Attest Kernel Access
//!
//! Capability verification and the governance lifecycle.
//!
//! ## Overview
//!
//! [`AccessControl`] answers one question: does this principal hold the
//! required capabilities on this subject? It resolves the subject's
//! effective provider (a per-subject override, else the default), looks the
//! provider up in the integrity-checked [`ProviderRegistry`], hands it the
//! caller's proof under a resource budget, and checks the returned mask.
//!
//! Everything on this path is a hard failure. A provider that is missing,
//! inactive or tampered yields [`AccessError::ProviderUnavailable`], never a
//! silent pass.
//!
//! ## Providers
//!
//! - [`SignedAttestationProvider`] - Ed25519-signed statements from trusted issuers
//! - [`VerifierBackedProvider`] - Delegates to a registered [`ProofVerifier`]
//!
//! ## Governance
//!
//! `AccessControl` holds a [`Governance`](attest_kernel_core::Governance)
//! handle shared with every registry. Governance-gated mutators across the
//! kernel take a [`GovernanceWitness`](attest_kernel_core::GovernanceWitness)
//! obtained from [`AccessControl::authorize`], which fails once the system is
//! ossified. Each mutator re-checks its witness against the shared state, so
//! a witness taken before a stage transition is rejected afterwards.

pub mod control;
pub mod error;
pub mod provider;
pub mod signed;
pub mod verifier;

pub use control::{AccessConfig, AccessControl, AccessRequest, AccessSnapshot};
pub use error::{AccessError, Result};
pub use provider::{AttestationProvider, ProofVerifier, ProviderRegistry, VerifierRegistry};
pub use signed::{SignedAttestation, SignedAttestationProvider, ATTESTATION_DOMAIN};
pub use verifier::{
    public_inputs, Ed25519ProofVerifier, VerifierBackedProvider, VerifierProof,
    PUBLIC_INPUTS_DOMAIN,
};
