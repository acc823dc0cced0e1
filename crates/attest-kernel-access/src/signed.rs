//! Signed attestations: an issuer vouches for a principal's capabilities.
//!
//! The proof handed to [`SignedAttestationProvider`] is a CBOR-encoded
//! [`SignedAttestation`]. The signature covers a domain-separated canonical
//! encoding of every other field, so an attestation for one subject or
//! principal cannot be replayed against another.

use std::collections::HashSet;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use attest_kernel_core::{
    Address, CallContext, Capabilities, Keypair, PublicKey, Signature, SubjectId,
};

use crate::error::{AccessError, Result};
use crate::provider::AttestationProvider;

/// Domain separator for attestation signatures.
pub const ATTESTATION_DOMAIN: &[u8] = b"attest-attestation-v0:";

/// Units charged before decoding, plus one per proof byte.
const DECODE_COST: u64 = 5_000;

/// Units charged for a signature verification.
const VERIFY_COST: u64 = 50_000;

/// Field keys for the canonical signing encoding.
mod keys {
    pub const ISSUER: u64 = 0;
    pub const PRINCIPAL: u64 = 1;
    pub const SUBJECT: u64 = 2;
    pub const CAPABILITIES: u64 = 3;
    pub const EXPIRES_AT: u64 = 4;
    pub const NONCE: u64 = 5;
}

/// An issuer's statement that `principal` holds `capabilities` on `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAttestation {
    pub issuer: PublicKey,
    pub principal: Address,
    pub subject: SubjectId,
    pub capabilities: Capabilities,
    /// Last valid instant (Unix ms).
    pub expires_at: i64,
    /// Distinguishes otherwise identical attestations.
    pub nonce: u64,
    pub signature: Signature,
}

impl SignedAttestation {
    /// Issue and sign an attestation.
    pub fn issue(
        issuer: &Keypair,
        principal: Address,
        subject: SubjectId,
        capabilities: Capabilities,
        expires_at: i64,
        nonce: u64,
    ) -> Result<Self> {
        let mut attestation = Self {
            issuer: issuer.public_key(),
            principal,
            subject,
            capabilities,
            expires_at,
            nonce,
            signature: Signature::ZERO,
        };
        attestation.signature = issuer.sign(&attestation.signing_bytes()?);
        Ok(attestation)
    }

    /// The bytes the issuer signs: domain || canonical CBOR of every field
    /// except the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let entries = vec![
            (key(keys::ISSUER), Value::Bytes(self.issuer.as_bytes().to_vec())),
            (key(keys::PRINCIPAL), Value::Bytes(self.principal.as_bytes().to_vec())),
            (key(keys::SUBJECT), Value::Bytes(self.subject.as_bytes().to_vec())),
            (
                key(keys::CAPABILITIES),
                Value::Bytes(self.capabilities.bits().to_be_bytes().to_vec()),
            ),
            (key(keys::EXPIRES_AT), Value::Integer(self.expires_at.into())),
            (key(keys::NONCE), Value::Integer(self.nonce.into())),
        ];

        let mut buf = ATTESTATION_DOMAIN.to_vec();
        ciborium::into_writer(&Value::Map(entries), &mut buf)
            .map_err(|e| AccessError::MalformedProof(e.to_string()))?;
        Ok(buf)
    }

    pub fn verify_signature(&self) -> bool {
        match self.signing_bytes() {
            Ok(message) => self.issuer.verify(&message, &self.signature),
            Err(_) => false,
        }
    }

    /// Whether the attestation is still valid at `now`.
    pub fn is_live(&self, now: i64) -> bool {
        now <= self.expires_at
    }

    /// Serialize to CBOR bytes (the proof format).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| AccessError::MalformedProof(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AccessError::MalformedProof(e.to_string()))
    }
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

/// Grants whatever a trusted issuer attested to.
#[derive(Debug, Clone, Default)]
pub struct SignedAttestationProvider {
    trusted: HashSet<PublicKey>,
}

impl SignedAttestationProvider {
    pub fn new(issuers: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            trusted: issuers.into_iter().collect(),
        }
    }

    pub fn trusts(&self, issuer: &PublicKey) -> bool {
        self.trusted.contains(issuer)
    }
}

impl AttestationProvider for SignedAttestationProvider {
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
        let attestation = match SignedAttestation::from_bytes(proof) {
            Ok(attestation) => attestation,
            Err(_) => return DENIED,
        };

        if !self.trusts(&attestation.issuer)
            || attestation.principal != principal
            || attestation.subject != subject
            || !attestation.is_live(ctx.now)
        {
            return DENIED;
        }

        if ctx.charge(VERIFY_COST).is_err() || !attestation.verify_signature() {
            return DENIED;
        }
        (true, attestation.capabilities)
    }
}
