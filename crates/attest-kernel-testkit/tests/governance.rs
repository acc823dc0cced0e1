//! Governance stages, pause and ossification through the kernel facade.

use std::sync::Arc;

use attest_kernel::core::{AuditEvent, GovernanceError};
use attest_kernel::{AccessRequest, Address, Capabilities, ErrorKind, KernelError, ModuleId, Stage};
use attest_kernel_testkit::fixtures::TestFixture;
use attest_kernel_testkit::mocks::{FixedProvider, RecordingResolver};

fn promote_to_dao(f: &TestFixture) -> Address {
    let multisig = Address::derive("multisig");
    let dao = Address::derive("dao");
    f.kernel.promote_to_multisig(f.governor, multisig).unwrap();
    f.kernel.promote_to_dao(multisig, dao).unwrap();
    dao
}

#[test]
fn stages_advance_one_way() {
    let f = TestFixture::new();
    assert_eq!(f.kernel.stage(), Stage::Bootstrap);

    let err = f
        .kernel
        .promote_to_dao(f.governor, Address::derive("dao"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(f.kernel.stage(), Stage::Bootstrap);

    let dao = promote_to_dao(&f);
    assert_eq!(f.kernel.stage(), Stage::Dao);

    // The bootstrap actor has lost its authority.
    assert_eq!(
        f.kernel.authorize(f.governor).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    assert!(f.kernel.authorize(dao).is_ok());

    let transitions = f
        .audit
        .matching(|e| matches!(e, AuditEvent::GovernanceTransition(_)));
    assert_eq!(transitions.len(), 2);
}

#[test]
fn ossify_freezes_every_governance_mutator() {
    let f = TestFixture::new();
    let provider = f
        .install_provider("p1", Arc::new(FixedProvider::granting(Capabilities::VIEWER)))
        .unwrap();
    let resolver = f
        .install_resolver("r1", Arc::new(RecordingResolver::new()))
        .unwrap();
    let dao = promote_to_dao(&f);
    let stale = f.kernel.authorize(dao).unwrap();

    f.kernel.ossify(dao).unwrap();
    assert_eq!(f.kernel.stage(), Stage::Ossified);

    let err = f.kernel.authorize(dao).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ossified);

    // A witness taken before ossification is no good afterwards.
    let now = f.kernel.now();
    let results: Vec<KernelError> = vec![
        f.kernel.pause(&stale).unwrap_err(),
        f.kernel.set_default_provider(&stale, provider).unwrap_err(),
        f.kernel
            .set_executor_whitelisted(&stale, Address::derive("exec"), true)
            .unwrap_err(),
        f.kernel
            .set_resolver_budget(&stale, resolver, Some(10))
            .unwrap_err(),
        f.kernel
            .providers()
            .deactivate(&stale, &provider, now)
            .unwrap_err()
            .into(),
        f.kernel
            .resolvers()
            .register(
                &stale,
                ModuleId::derive("late"),
                Address::derive("r1"),
                "test-resolver",
                "late",
                now,
            )
            .unwrap_err()
            .into(),
        f.kernel
            .verifiers()
            .update_metadata(&stale, &ModuleId::derive("none"), "d", "t")
            .unwrap_err()
            .into(),
        // Bad arguments still report the frozen system first.
        f.kernel
            .set_default_provider(&stale, ModuleId::derive("unknown"))
            .unwrap_err(),
        f.kernel
            .set_resolver_budget(&stale, resolver, Some(0))
            .unwrap_err(),
        f.kernel
            .set_resolver_budget(&stale, ModuleId::derive("ghost"), Some(10))
            .unwrap_err(),
        f.kernel
            .set_executor_whitelisted(&stale, Address::ZERO, true)
            .unwrap_err(),
    ];
    for err in results {
        assert_eq!(err.kind(), ErrorKind::Ossified, "{:?}", err);
    }

    let err = f.kernel.ossify(dao).unwrap_err();
    assert!(matches!(
        err,
        KernelError::Access(attest_kernel::access::AccessError::Governance(
            GovernanceError::Ossified
        ))
    ));
}

#[test]
fn ossified_governance_cannot_emergency_unlock() {
    let f = TestFixture::new();
    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "deed").unwrap();
    f.kernel.lock_resolvers(alice, subject).unwrap();

    let dao = promote_to_dao(&f);
    f.kernel.ossify(dao).unwrap();

    let err = f
        .kernel
        .emergency_unlock(dao, subject, "too late")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ossified);

    // The emergency actor is unaffected by governance until its own expiry.
    f.kernel
        .emergency_unlock(f.emergency, subject, "still in window")
        .unwrap();
}

#[test]
fn pause_blocks_verification_and_subject_mutation() {
    let f = TestFixture::new();
    let provider = f
        .install_provider("p1", Arc::new(FixedProvider::granting(Capabilities::PARTICIPANT)))
        .unwrap();
    f.kernel.set_default_provider(&f.witness(), provider).unwrap();
    let alice = Address::derive("alice");
    let subject = f.register_subject(alice, "doc").unwrap();
    f.kernel.lock_resolvers(alice, subject).unwrap();

    f.kernel.pause(&f.witness()).unwrap();
    assert!(f.kernel.is_paused());
    assert_eq!(
        f.kernel.pause(&f.witness()).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );

    let request = AccessRequest::new(alice, subject, Capabilities::CLAIM, &[]);
    assert_eq!(
        f.kernel.check_capability(&request).unwrap_err().kind(),
        ErrorKind::SystemPaused
    );
    assert_eq!(
        f.kernel
            .transfer_ownership(alice, subject, Address::derive("bob"))
            .unwrap_err()
            .kind(),
        ErrorKind::SystemPaused
    );

    // Emergency unlock still works while paused.
    f.kernel
        .emergency_unlock(f.governor, subject, "incident response")
        .unwrap();

    f.kernel.unpause(&f.witness()).unwrap();
    assert!(f.kernel.check_capability(&request).is_ok());
}

#[test]
fn cannot_ossify_while_paused() {
    let f = TestFixture::new();
    let dao = promote_to_dao(&f);
    let w = f.kernel.authorize(dao).unwrap();
    f.kernel.pause(&w).unwrap();

    let err = f.kernel.ossify(dao).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SystemPaused);
    assert_eq!(f.kernel.stage(), Stage::Dao);

    f.kernel.unpause(&w).unwrap();
    f.kernel.ossify(dao).unwrap();
}

#[test]
fn resolver_budget_overrides_are_bounded() {
    let f = TestFixture::new();
    let resolver = f
        .install_resolver("r1", Arc::new(RecordingResolver::new()))
        .unwrap();
    let ceiling = f.config.resolver_budgets.hard_ceiling;

    for bad in [0, ceiling + 1] {
        let err = f
            .kernel
            .set_resolver_budget(&f.witness(), resolver, Some(bad))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    let err = f
        .kernel
        .set_resolver_budget(&f.witness(), ModuleId::derive("ghost"), Some(10))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    f.kernel
        .set_resolver_budget(&f.witness(), resolver, Some(ceiling))
        .unwrap();
    assert_eq!(f.kernel.resolver_budget(&resolver), Some(ceiling));
    f.kernel.set_resolver_budget(&f.witness(), resolver, None).unwrap();
    assert_eq!(f.kernel.resolver_budget(&resolver), None);
}
