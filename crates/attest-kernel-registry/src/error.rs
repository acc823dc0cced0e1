//! Error types for the integrity registries.

use attest_kernel_core::{Address, ErrorKind, Fingerprint, GovernanceError, ModuleId};
use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// Note that an inactive or tampered module is *not* an error for
/// [`lookup`](crate::IntegrityRegistry::lookup); it yields `None`.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No module is registered under this id.
    #[error("module not found: {0}")]
    NotFound(ModuleId),

    /// A module is already registered under this id.
    #[error("module already registered: {0}")]
    AlreadyRegistered(ModuleId),

    /// Nothing is deployed at the reference.
    #[error("no module deployed at {0}")]
    NotAModule(Address),

    /// The code behind the reference changed since registration.
    #[error("module {id} identity changed: registered {expected}, now {actual:?}")]
    IdentityChanged {
        id: ModuleId,
        expected: Fingerprint,
        actual: Option<Fingerprint>,
    },

    /// The module is already in the requested activation state.
    #[error("module {id} already has active = {active}")]
    AlreadyInState { id: ModuleId, active: bool },

    /// Description or module type is unusable.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Governance error.
    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            RegistryError::NotAModule(_) => ErrorKind::NotAModule,
            RegistryError::IdentityChanged { .. } => ErrorKind::IdentityChanged,
            RegistryError::AlreadyInState { .. } | RegistryError::InvalidMetadata(_) => {
                ErrorKind::InvalidArgument
            }
            RegistryError::Governance(e) => e.kind(),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
