//! Pluggable verification modules.

use attest_kernel_core::{Address, CallContext, Capabilities, SubjectId};
use attest_kernel_registry::IntegrityRegistry;

/// Verifies caller-supplied proofs and reports which capabilities they grant.
///
/// Proof formats are opaque to the kernel. Implementations are read-only
/// from the kernel's point of view and should charge their work against
/// `ctx`; a call that runs the meter dry is treated as failed regardless of
/// what it returns.
pub trait AttestationProvider: Send + Sync {
    /// Returns `(verified, granted)`.
    fn verify_capabilities(
        &self,
        proof: &[u8],
        principal: Address,
        subject: SubjectId,
        required: Capabilities,
        ctx: &mut CallContext<'_>,
    ) -> (bool, Capabilities);
}

/// Checks a proof against public inputs, e.g. a zero-knowledge or signature
/// verifier that providers delegate to.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &[u8], public_inputs: &[u8], ctx: &mut CallContext<'_>) -> bool;
}

/// Registry of attestation providers.
pub type ProviderRegistry = IntegrityRegistry<dyn AttestationProvider>;

/// Registry of proof verifiers.
pub type VerifierRegistry = IntegrityRegistry<dyn ProofVerifier>;
