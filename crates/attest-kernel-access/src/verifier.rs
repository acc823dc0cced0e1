//! Providers that delegate proof checking to registered verifiers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use attest_kernel_core::{
    Address, CallContext, Capabilities, Keypair, ModuleId, PublicKey, Signature, SubjectId,
};

use crate::error::{AccessError, Result};
use crate::provider::{AttestationProvider, ProofVerifier, VerifierRegistry};

/// Domain separator for verifier public inputs.
pub const PUBLIC_INPUTS_DOMAIN: &[u8] = b"attest-public-inputs-v0:";

const DECODE_COST: u64 = 5_000;
const VERIFY_COST: u64 = 50_000;

/// The public inputs a verifier checks a proof against.
///
/// Binds principal, subject and the claimed capabilities, so a proof
/// cannot be lifted onto a different request.
pub fn public_inputs(principal: &Address, subject: &SubjectId, capabilities: Capabilities) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PUBLIC_INPUTS_DOMAIN.len() + 32 + 32 + 16);
    buf.extend_from_slice(PUBLIC_INPUTS_DOMAIN);
    buf.extend_from_slice(principal.as_bytes());
    buf.extend_from_slice(subject.as_bytes());
    buf.extend_from_slice(&capabilities.bits().to_be_bytes());
    buf
}

/// Proof format for [`VerifierBackedProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierProof {
    /// Which registered verifier checks `proof`.
    pub verifier: ModuleId,
    /// Capabilities claimed by the proof.
    pub capabilities: Capabilities,
    /// Verifier-specific proof bytes.
    pub proof: Vec<u8>,
}

impl VerifierProof {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| AccessError::MalformedProof(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AccessError::MalformedProof(e.to_string()))
    }
}

/// Grants the claimed capabilities when the named verifier accepts the proof.
///
/// Verifiers come from a shared [`VerifierRegistry`]. An unavailable verifier
/// (inactive, unknown or tampered) means "not verified"; the access-control
/// core turns that into a denial.
pub struct VerifierBackedProvider {
    verifiers: Arc<VerifierRegistry>,
}

impl VerifierBackedProvider {
    pub fn new(verifiers: Arc<VerifierRegistry>) -> Self {
        Self { verifiers }
    }
}

impl AttestationProvider for VerifierBackedProvider {
    fn verify_capabilities(
        &self,
        proof: &[u8],
        principal: Address,
        subject: SubjectId,
        _required: Capabilities,
        ctx: &mut CallContext<'_>,
    ) -> (bool, Capabilities) {
        const DENIED: (bool, Capabilities) = (false, Capabilities::NONE);

        if ctx.charge(DECODE_COST.saturating_add(proof.len() as u64)).is_err() {
            return DENIED;
        }
        let envelope = match VerifierProof::from_bytes(proof) {
            Ok(envelope) => envelope,
            Err(_) => return DENIED,
        };

        let verifier = match self.verifiers.lookup(&envelope.verifier) {
            Some(verifier) => verifier,
            None => {
                tracing::warn!(verifier = %envelope.verifier, "proof verifier unavailable");
                return DENIED;
            }
        };

        let inputs = public_inputs(&principal, &subject, envelope.capabilities);
        if verifier.verify(&envelope.proof, &inputs, ctx) {
            (true, envelope.capabilities)
        } else {
            DENIED
        }
    }
}

/// Accepts a proof that is an Ed25519 signature by a fixed key over the
/// public inputs.
#[derive(Debug, Clone)]
pub struct Ed25519ProofVerifier {
    key: PublicKey,
}

impl Ed25519ProofVerifier {
    pub fn new(key: PublicKey) -> Self {
        Self { key }
    }

    /// Produce a proof this verifier accepts.
    pub fn prove(
        signer: &Keypair,
        principal: &Address,
        subject: &SubjectId,
        capabilities: Capabilities,
    ) -> Vec<u8> {
        signer
            .sign(&public_inputs(principal, subject, capabilities))
            .as_bytes()
            .to_vec()
    }
}

impl ProofVerifier for Ed25519ProofVerifier {
    fn verify(&self, proof: &[u8], public_inputs: &[u8], ctx: &mut CallContext<'_>) -> bool {
        if ctx.charge(VERIFY_COST).is_err() {
            return false;
        }
        match <[u8; 64]>::try_from(proof) {
            Ok(bytes) => self.key.verify(public_inputs, &Signature::from_bytes(bytes)),
            Err(_) => false,
        }
    }
}
