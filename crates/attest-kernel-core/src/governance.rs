//! The governance stage machine.
//!
//! Upgrade authority is removed in one direction only:
//!
//! ```text
//! Bootstrap ──▶ Multisig ──▶ Dao ──▶ Ossified
//! ```
//!
//! Each stage has exactly one actor. Only that actor may start the next
//! transition, and the transition installs the next actor and retires the
//! current one in the same step. Once ossified, every governance-gated
//! mutator fails with [`GovernanceError::Ossified`].
//!
//! Governance-gated mutators elsewhere in the kernel take a
//! [`GovernanceWitness`], which only [`GovernanceState::authorize`] can
//! produce. A mutator cannot forget the ossification check because it
//! cannot obtain a witness without passing it.
//!
//! Every component holding governance-gated state shares one [`Governance`]
//! handle and re-confirms the witness against it before mutating, so a
//! witness issued before a transition is worthless after it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;
use crate::types::Address;

/// A governance stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Bootstrap,
    Multisig,
    Dao,
    Ossified,
}

impl Stage {
    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Bootstrap => Some(Stage::Multisig),
            Stage::Multisig => Some(Stage::Dao),
            Stage::Dao => Some(Stage::Ossified),
            Stage::Ossified => None,
        }
    }
}

/// A completed stage transition, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    /// The actor that initiated the transition (and lost authority).
    pub by: Address,
    /// The actor installed by the transition. `None` for ossification.
    pub installed: Option<Address>,
    pub at: i64,
}

/// Governance state, threaded explicitly through the access-control core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    stage: Stage,
    bootstrap_actor: Address,
    multisig_actor: Option<Address>,
    dao_actor: Option<Address>,
    ossified_at: Option<i64>,
    transitions: Vec<StageTransition>,
}

/// Evidence that `actor` held governance authority when it was issued.
///
/// Not `Clone`; obtained per call from [`GovernanceState::authorize`].
#[derive(Debug)]
pub struct GovernanceWitness {
    actor: Address,
    stage: Stage,
}

impl GovernanceWitness {
    pub fn actor(&self) -> Address {
        self.actor
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl GovernanceState {
    /// Start in the bootstrap stage with the given actor.
    pub fn new(bootstrap_actor: Address) -> Self {
        Self {
            stage: Stage::Bootstrap,
            bootstrap_actor,
            multisig_actor: None,
            dao_actor: None,
            ossified_at: None,
            transitions: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_ossified(&self) -> bool {
        self.stage == Stage::Ossified
    }

    pub fn bootstrap_actor(&self) -> Address {
        self.bootstrap_actor
    }

    pub fn multisig_actor(&self) -> Option<Address> {
        self.multisig_actor
    }

    pub fn dao_actor(&self) -> Option<Address> {
        self.dao_actor
    }

    pub fn ossified_at(&self) -> Option<i64> {
        self.ossified_at
    }

    /// Completed transitions, oldest first.
    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// The actor currently holding governance authority.
    ///
    /// `None` once ossified.
    pub fn governor(&self) -> Option<Address> {
        match self.stage {
            Stage::Bootstrap => Some(self.bootstrap_actor),
            Stage::Multisig => self.multisig_actor,
            Stage::Dao => self.dao_actor,
            Stage::Ossified => None,
        }
    }

    /// Check that `caller` may perform a governance-gated mutation.
    pub fn authorize(&self, caller: Address) -> Result<GovernanceWitness, GovernanceError> {
        if self.is_ossified() {
            return Err(GovernanceError::Ossified);
        }
        match self.governor() {
            Some(governor) if governor == caller => Ok(GovernanceWitness {
                actor: caller,
                stage: self.stage,
            }),
            _ => Err(GovernanceError::Unauthorized { caller }),
        }
    }

    /// Check that a previously issued witness is still current.
    ///
    /// Holders of long-lived state re-confirm before mutating, so a witness
    /// obtained before a transition cannot be spent after it.
    pub fn confirm(&self, witness: &GovernanceWitness) -> Result<(), GovernanceError> {
        let current = self.authorize(witness.actor)?;
        if current.stage != witness.stage {
            return Err(GovernanceError::Unauthorized {
                caller: witness.actor,
            });
        }
        Ok(())
    }

    /// `Bootstrap -> Multisig`, initiated by the bootstrap actor.
    pub fn promote_to_multisig(
        &mut self,
        caller: Address,
        multisig: Address,
        now: i64,
    ) -> Result<StageTransition, GovernanceError> {
        self.advance(caller, Stage::Multisig, Some(multisig), now)
    }

    /// `Multisig -> Dao`, initiated by the multisig actor.
    pub fn promote_to_dao(
        &mut self,
        caller: Address,
        dao: Address,
        now: i64,
    ) -> Result<StageTransition, GovernanceError> {
        self.advance(caller, Stage::Dao, Some(dao), now)
    }

    /// `Dao -> Ossified`, initiated by the DAO actor. Irreversible.
    pub fn ossify(&mut self, caller: Address, now: i64) -> Result<StageTransition, GovernanceError> {
        self.advance(caller, Stage::Ossified, None, now)
    }

    /// Validate everything first; mutate only once every check has passed,
    /// so a failed attempt leaves the state untouched.
    fn advance(
        &mut self,
        caller: Address,
        target: Stage,
        installed: Option<Address>,
        now: i64,
    ) -> Result<StageTransition, GovernanceError> {
        if self.is_ossified() {
            return Err(GovernanceError::Ossified);
        }
        if self.stage.next() != Some(target) {
            return Err(GovernanceError::InvalidTransition {
                from: self.stage,
                attempted: target,
            });
        }
        let witness = self.authorize(caller)?;

        if let Some(actor) = installed {
            if actor.is_zero() {
                return Err(GovernanceError::InvalidActor("zero address".into()));
            }
            if actor == witness.actor {
                return Err(GovernanceError::InvalidActor(
                    "new actor must differ from the outgoing actor".into(),
                ));
            }
        }

        let transition = StageTransition {
            from: self.stage,
            to: target,
            by: caller,
            installed,
            at: now,
        };

        match target {
            Stage::Multisig => self.multisig_actor = installed,
            Stage::Dao => self.dao_actor = installed,
            Stage::Ossified => self.ossified_at = Some(now),
            Stage::Bootstrap => {}
        }
        self.stage = target;
        self.transitions.push(transition.clone());

        Ok(transition)
    }
}

/// Shared, live governance state.
///
/// Cloning the handle shares the state. Transitions made through any clone
/// are seen by every holder.
#[derive(Debug, Clone)]
pub struct Governance {
    state: Arc<RwLock<GovernanceState>>,
}

impl Governance {
    /// Start in the bootstrap stage with the given actor.
    pub fn new(bootstrap_actor: Address) -> Self {
        Self::from_state(GovernanceState::new(bootstrap_actor))
    }

    /// Resume from persisted state.
    pub fn from_state(state: GovernanceState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> GovernanceState {
        self.read().clone()
    }

    pub fn stage(&self) -> Stage {
        self.read().stage()
    }

    /// See [`GovernanceState::authorize`].
    pub fn authorize(&self, caller: Address) -> Result<GovernanceWitness, GovernanceError> {
        self.read().authorize(caller)
    }

    /// See [`GovernanceState::confirm`].
    pub fn confirm(&self, witness: &GovernanceWitness) -> Result<(), GovernanceError> {
        self.read().confirm(witness)
    }

    /// Apply `f` under the write lock.
    ///
    /// Transitions go through here so that no witness can be confirmed
    /// halfway through one.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut GovernanceState) -> Result<T, GovernanceError>,
    ) -> Result<T, GovernanceError> {
        f(&mut self.write())
    }

    fn read(&self) -> RwLockReadGuard<'_, GovernanceState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GovernanceState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actors() -> (Address, Address, Address) {
        (
            Address::derive("bootstrap"),
            Address::derive("multisig"),
            Address::derive("dao"),
        )
    }

    fn at_dao() -> GovernanceState {
        let (boot, multi, dao) = actors();
        let mut state = GovernanceState::new(boot);
        state.promote_to_multisig(boot, multi, 1).unwrap();
        state.promote_to_dao(multi, dao, 2).unwrap();
        state
    }

    #[test]
    fn test_full_progression() {
        let (boot, multi, dao) = actors();
        let mut state = at_dao();
        assert_eq!(state.governor(), Some(dao));

        let t = state.ossify(dao, 3).unwrap();
        assert_eq!(t.from, Stage::Dao);
        assert_eq!(t.to, Stage::Ossified);
        assert_eq!(state.ossified_at(), Some(3));
        assert_eq!(state.governor(), None);

        let stages: Vec<_> = state.transitions().iter().map(|t| t.to).collect();
        assert_eq!(stages, vec![Stage::Multisig, Stage::Dao, Stage::Ossified]);

        for actor in [boot, multi, dao] {
            assert_eq!(state.authorize(actor).unwrap_err(), GovernanceError::Ossified);
        }
    }

    #[test]
    fn test_skip_stage_is_invalid() {
        let (boot, _, dao) = actors();
        let mut state = GovernanceState::new(boot);

        let err = state.promote_to_dao(boot, dao, 1).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidTransition {
                from: Stage::Bootstrap,
                attempted: Stage::Dao
            }
        ));
        assert_eq!(state.stage(), Stage::Bootstrap);

        let err = state.ossify(boot, 1).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidTransition { .. }));
    }

    #[test]
    fn test_no_stage_is_revisited() {
        let (boot, multi, _) = actors();
        let mut state = GovernanceState::new(boot);
        state.promote_to_multisig(boot, multi, 1).unwrap();

        let err = state.promote_to_multisig(multi, boot, 2).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidTransition { .. }));
    }

    #[test]
    fn test_old_actor_loses_authority() {
        let (boot, multi, _) = actors();
        let mut state = GovernanceState::new(boot);
        assert!(state.authorize(boot).is_ok());

        state.promote_to_multisig(boot, multi, 1).unwrap();
        assert_eq!(
            state.authorize(boot).unwrap_err(),
            GovernanceError::Unauthorized { caller: boot }
        );
        assert_eq!(state.authorize(multi).unwrap().stage(), Stage::Multisig);
    }

    #[test]
    fn test_only_current_actor_transitions() {
        let (boot, multi, dao) = actors();
        let mut state = GovernanceState::new(boot);

        let err = state.promote_to_multisig(multi, multi, 1).unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized { .. }));
        assert_eq!(state.stage(), Stage::Bootstrap);

        state.promote_to_multisig(boot, multi, 1).unwrap();
        let err = state.promote_to_dao(dao, dao, 2).unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized { .. }));
    }

    #[test]
    fn test_stale_witness_is_not_confirmed() {
        let (boot, multi, dao) = actors();
        let mut state = GovernanceState::new(boot);
        let witness = state.authorize(boot).unwrap();
        assert!(state.confirm(&witness).is_ok());

        state.promote_to_multisig(boot, multi, 1).unwrap();
        assert!(matches!(
            state.confirm(&witness),
            Err(GovernanceError::Unauthorized { .. })
        ));

        let witness = state.authorize(multi).unwrap();
        state.promote_to_dao(multi, dao, 2).unwrap();
        let witness_dao = state.authorize(dao).unwrap();
        state.ossify(dao, 3).unwrap();
        assert_eq!(state.confirm(&witness).unwrap_err(), GovernanceError::Ossified);
        assert_eq!(state.confirm(&witness_dao).unwrap_err(), GovernanceError::Ossified);
    }

    #[test]
    fn test_invalid_actor_leaves_state_unchanged() {
        let (boot, _, _) = actors();
        let mut state = GovernanceState::new(boot);
        let before = state.clone();

        assert!(matches!(
            state.promote_to_multisig(boot, Address::ZERO, 1),
            Err(GovernanceError::InvalidActor(_))
        ));
        assert!(matches!(
            state.promote_to_multisig(boot, boot, 1),
            Err(GovernanceError::InvalidActor(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_shared_handle_sees_transitions() {
        let (boot, multi, _) = actors();
        let governance = Governance::new(boot);
        let other = governance.clone();
        let witness = other.authorize(boot).unwrap();

        governance
            .update(|state| state.promote_to_multisig(boot, multi, 1))
            .unwrap();
        assert_eq!(other.stage(), Stage::Multisig);
        assert!(other.confirm(&witness).is_err());
        assert_eq!(other.snapshot(), governance.snapshot());
    }
}
