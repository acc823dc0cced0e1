//! End-to-end scenarios across providers, resolvers and governance.

use std::sync::Arc;

use attest_kernel::access::{
    Ed25519ProofVerifier, SignedAttestation, SignedAttestationProvider, VerifierBackedProvider,
    VerifierProof,
};
use attest_kernel::core::{AuditEvent, Keypair};
use attest_kernel::{AccessRequest, Address, Capabilities, ErrorKind, KernelError};
use attest_kernel_testkit::fixtures::{TestFixture, EMERGENCY_WINDOW, GENESIS};
use attest_kernel_testkit::mocks::{FixedProvider, RecordingResolver};

#[test]
fn verify_then_deactivate_provider() {
    let f = TestFixture::new();
    let p1 = f
        .install_provider("p1", Arc::new(FixedProvider::granting(Capabilities::PARTICIPANT)))
        .unwrap();
    f.kernel.set_default_provider(&f.witness(), p1).unwrap();

    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "contract").unwrap();
    let request = AccessRequest::new(alice, subject, Capabilities::CLAIM, b"proof");

    let granted = f.kernel.verify_capability(&request).unwrap();
    assert!(granted.contains(Capabilities::CLAIM));
    assert_eq!(
        f.audit
            .matching(|e| matches!(e, AuditEvent::CapabilityVerified { .. }))
            .len(),
        1
    );

    f.kernel
        .providers()
        .deactivate(&f.witness(), &p1, f.kernel.now())
        .unwrap();

    let err = f.kernel.verify_capability(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    // No fallback to another provider, and nothing new recorded.
    assert_eq!(
        f.audit
            .matching(|e| matches!(e, AuditEvent::CapabilityVerified { .. }))
            .len(),
        1
    );
}

#[test]
fn emergency_unlock_after_expiry_needs_governance() {
    let f = TestFixture::new();
    let notify = f
        .install_resolver("notify", Arc::new(RecordingResolver::new()))
        .unwrap();
    let extra = f
        .install_resolver("extra", Arc::new(RecordingResolver::new()))
        .unwrap();
    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "deed").unwrap();
    f.kernel.add_additional_resolver(alice, subject, notify).unwrap();
    f.kernel.lock_resolvers(alice, subject).unwrap();

    let err = f
        .kernel
        .add_additional_resolver(alice, subject, extra)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResolversLocked);

    f.clock.set(GENESIS + EMERGENCY_WINDOW + 1);
    let err = f
        .kernel
        .emergency_unlock(f.emergency, subject, "compliance resolver compromised")
        .unwrap_err();
    assert!(matches!(err, KernelError::EmergencyExpired { .. }));
    assert!(f.kernel.subject(&subject).unwrap().resolvers_locked);

    f.kernel
        .emergency_unlock(f.governor, subject, "compliance resolver compromised")
        .unwrap();
    assert!(!f.kernel.subject(&subject).unwrap().resolvers_locked);
    f.kernel.add_additional_resolver(alice, subject, extra).unwrap();

    let history = f.kernel.unlock_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].by, f.governor);
    assert_eq!(history[0].justification, "compliance resolver compromised");
}

#[test]
fn emergency_actor_within_window() {
    let f = TestFixture::new();
    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "deed").unwrap();
    f.kernel.lock_resolvers(alice, subject).unwrap();

    let err = f.kernel.emergency_unlock(f.emergency, subject, "   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = f
        .kernel
        .emergency_unlock(Address::derive("mallory"), subject, "because")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    f.clock.set(GENESIS + EMERGENCY_WINDOW);
    f.kernel.emergency_unlock(f.emergency, subject, "key rotation").unwrap();

    let err = f
        .kernel
        .emergency_unlock(f.emergency, subject, "again")
        .unwrap_err();
    assert!(matches!(err, KernelError::ResolversNotLocked(_)));
}

#[test]
fn signed_attestation_flow() {
    let f = TestFixture::new();
    let issuer = Keypair::from_seed(&[9u8; 32]);
    let provider = SignedAttestationProvider::new([issuer.public_key()]);
    let id = f.install_provider("signed", Arc::new(provider)).unwrap();
    f.kernel.set_default_provider(&f.witness(), id).unwrap();

    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "invoice").unwrap();
    let attestation = SignedAttestation::issue(
        &issuer,
        alice,
        subject,
        Capabilities::PARTICIPANT,
        GENESIS + 60_000,
        1,
    )
    .unwrap();
    let proof = attestation.to_bytes().unwrap();

    let request = AccessRequest::new(alice, subject, Capabilities::CLAIM, &proof);
    assert!(f.kernel.verify_capability(&request).is_ok());

    let request = AccessRequest::new(alice, subject, Capabilities::UPDATE, &proof);
    let err = f.kernel.verify_capability(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityDenied);

    // Someone else presenting alice's attestation.
    let request = AccessRequest::new(Address::derive("bob"), subject, Capabilities::CLAIM, &proof);
    let err = f.kernel.check_capability(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityDenied);

    f.clock.set(GENESIS + 60_001);
    let request = AccessRequest::new(alice, subject, Capabilities::CLAIM, &proof);
    let err = f.kernel.check_capability(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityDenied);
}

#[test]
fn verifier_backed_flow_degrades_when_verifier_retires() {
    let f = TestFixture::new();
    let signer = Keypair::from_seed(&[3u8; 32]);
    let verifier = f
        .install_verifier("ed25519", Arc::new(Ed25519ProofVerifier::new(signer.public_key())))
        .unwrap();
    let provider = VerifierBackedProvider::new(f.kernel.verifiers().clone());
    let id = f.install_provider("zk", Arc::new(provider)).unwrap();
    f.kernel.set_default_provider(&f.witness(), id).unwrap();

    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "record").unwrap();
    let proof = VerifierProof {
        verifier,
        capabilities: Capabilities::MANAGER,
        proof: Ed25519ProofVerifier::prove(&signer, &alice, &subject, Capabilities::MANAGER),
    }
    .to_bytes()
    .unwrap();

    let request = AccessRequest::new(alice, subject, Capabilities::UPDATE, &proof);
    assert_eq!(f.kernel.check_capability(&request).unwrap(), Capabilities::MANAGER);

    f.kernel
        .verifiers()
        .deactivate(&f.witness(), &verifier, f.kernel.now())
        .unwrap();
    let err = f.kernel.check_capability(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapabilityDenied);
}

#[test]
fn subject_override_routes_to_its_provider() {
    let f = TestFixture::new();
    let viewer = f
        .install_provider("viewer", Arc::new(FixedProvider::granting(Capabilities::VIEWER)))
        .unwrap();
    let manager = f
        .install_provider("manager", Arc::new(FixedProvider::granting(Capabilities::MANAGER)))
        .unwrap();
    f.kernel.set_default_provider(&f.witness(), viewer).unwrap();

    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    let subject = f.register_subject(alice, "ledger").unwrap();
    let request = AccessRequest::new(alice, subject, Capabilities::UPDATE, &[]);
    assert_eq!(
        f.kernel.check_capability(&request).unwrap_err().kind(),
        ErrorKind::CapabilityDenied
    );

    let err = f
        .kernel
        .set_subject_provider(bob, subject, Some(manager))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    f.kernel.set_subject_provider(alice, subject, Some(manager)).unwrap();
    assert!(f.kernel.check_capability(&request).is_ok());

    f.kernel.set_subject_provider(alice, subject, None).unwrap();
    assert!(f.kernel.check_capability(&request).is_err());
}

#[test]
fn guarded_body_runs_after_verification() {
    let f = TestFixture::new();
    let id = f
        .install_provider("p1", Arc::new(FixedProvider::granting(Capabilities::PARTICIPANT)))
        .unwrap();
    f.kernel.set_default_provider(&f.witness(), id).unwrap();
    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "claimable").unwrap();

    let request = AccessRequest::new(alice, subject, Capabilities::CLAIM, &[]);
    let claimed: Result<&str, KernelError> = f.kernel.guarded(&request, |granted| {
        assert!(granted.contains(Capabilities::CLAIM));
        Ok("claimed")
    });
    assert_eq!(claimed.unwrap(), "claimed");

    let request = AccessRequest::new(alice, subject, Capabilities::WITHDRAW, &[]);
    let mut ran = false;
    let denied: Result<(), KernelError> = f.kernel.guarded(&request, |_| {
        ran = true;
        Ok(())
    });
    assert_eq!(denied.unwrap_err().kind(), ErrorKind::CapabilityDenied);
    assert!(!ran);
}
