//! Error types and the shared failure taxonomy.

use thiserror::Error;

use crate::governance::Stage;
use crate::types::Address;

/// Failure taxonomy shared by every crate in the kernel.
///
/// Each crate's error enum maps onto one of these through a `kind()` method,
/// so calling layers can tell "compliance resolver unavailable" apart from
/// "insufficient permission" without matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyRegistered,
    NotAModule,
    IdentityChanged,
    Inactive,
    ProviderUnavailable,
    CapabilityDenied,
    SystemPaused,
    Ossified,
    InvalidTransition,
    ResolverUnavailable,
    ResourceExceeded,
    TransferRejectedByResolver,
    Unauthorized,
    InvalidArgument,
    ResolversLocked,
    Reentrant,
    Storage,
}

/// Errors raised by the governance stage machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// The system is ossified; no governance-gated mutation is possible.
    #[error("governance is ossified")]
    Ossified,

    /// The caller is not the actor of the current stage.
    #[error("caller {caller} is not the current governor")]
    Unauthorized { caller: Address },

    /// The requested transition is not the next one from the current stage.
    #[error("invalid governance transition from {from:?} to {attempted:?}")]
    InvalidTransition { from: Stage, attempted: Stage },

    /// The actor being installed is unusable.
    #[error("invalid governance actor: {0}")]
    InvalidActor(String),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::Ossified => ErrorKind::Ossified,
            GovernanceError::Unauthorized { .. } => ErrorKind::Unauthorized,
            GovernanceError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            GovernanceError::InvalidActor(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Errors from the core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Governance error.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// An external call ran past its resource budget.
    #[error("resource budget exceeded: limit {limit}, requested {requested}")]
    ResourceExceeded { limit: u64, requested: u64 },

    /// A guarded entry point was entered while already in flight.
    #[error("reentrant call into {0}")]
    Reentrant(String),

    /// Encoding error.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// Decoding error.
    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Governance(e) => e.kind(),
            CoreError::ResourceExceeded { .. } => ErrorKind::ResourceExceeded,
            CoreError::Reentrant(_) => ErrorKind::Reentrant,
            CoreError::EncodingError(_) | CoreError::DecodingError(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
