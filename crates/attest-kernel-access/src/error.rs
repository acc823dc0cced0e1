//! Error types for access control.

use attest_kernel_core::{
    Address, Capabilities, CoreError, ErrorKind, GovernanceError, ModuleId, SubjectId,
};
use attest_kernel_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur during capability verification and provider management.
#[derive(Debug, Error)]
pub enum AccessError {
    /// No provider is configured, or the configured one failed its lookup.
    ///
    /// Always a hard failure: an unavailable gatekeeper never means "no
    /// restriction".
    #[error("attestation provider unavailable: {provider:?}")]
    ProviderUnavailable { provider: Option<ModuleId> },

    /// The provider refused the proof, or granted too little.
    #[error("principal {principal} lacks {required} on subject {subject} (granted {granted})")]
    CapabilityDenied {
        principal: Address,
        subject: SubjectId,
        required: Capabilities,
        granted: Capabilities,
    },

    /// Capability verification is paused.
    #[error("system is paused")]
    SystemPaused,

    /// The system is already in the requested pause state.
    #[error("pause state already {0}")]
    PauseUnchanged(bool),

    /// The provider ran over its resource budget.
    #[error("provider {provider} exceeded its budget of {limit} units")]
    ResourceExceeded { provider: ModuleId, limit: u64 },

    /// A provider cannot be selected because it is inactive.
    #[error("provider {0} is inactive")]
    ProviderInactive(ModuleId),

    /// A provider cannot be selected because its code changed since registration.
    #[error("provider {0} failed its integrity check")]
    ProviderIdentityChanged(ModuleId),

    /// A proof could not be encoded or decoded.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Governance error.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// Core error (reentrancy, metering).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            AccessError::CapabilityDenied { .. } => ErrorKind::CapabilityDenied,
            AccessError::SystemPaused => ErrorKind::SystemPaused,
            AccessError::PauseUnchanged(_) => ErrorKind::InvalidArgument,
            AccessError::ResourceExceeded { .. } => ErrorKind::ResourceExceeded,
            AccessError::ProviderInactive(_) => ErrorKind::Inactive,
            AccessError::ProviderIdentityChanged(_) => ErrorKind::IdentityChanged,
            AccessError::MalformedProof(_) => ErrorKind::InvalidArgument,
            AccessError::Registry(e) => e.kind(),
            AccessError::Governance(e) => e.kind(),
            AccessError::Core(e) => e.kind(),
        }
    }
}

/// Result type for access-control operations.
pub type Result<T> = std::result::Result<T, AccessError>;
