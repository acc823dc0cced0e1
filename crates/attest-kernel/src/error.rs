//! Error types for the Kernel.

use attest_kernel_access::AccessError;
use attest_kernel_core::{Address, CoreError, ErrorKind, GovernanceError, ModuleId, SubjectId};
use attest_kernel_registry::RegistryError;
use attest_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Access-control error.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Governance error.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Subject not found.
    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// Subject already exists.
    #[error("subject already exists: {0}")]
    SubjectExists(SubjectId),

    #[error("{caller} is not the owner of {subject}")]
    NotOwner { subject: SubjectId, caller: Address },

    #[error("{caller} is neither owner nor executor of {subject}")]
    NotOwnerOrExecutor { subject: SubjectId, caller: Address },

    /// The subject's resolver configuration is frozen.
    #[error("resolvers of {0} are locked")]
    ResolversLocked(SubjectId),

    #[error("resolvers of {0} are not locked")]
    ResolversNotLocked(SubjectId),

    /// The primary resolver could not be reached.
    #[error("resolver {resolver} unavailable for {subject}")]
    ResolverUnavailable { subject: SubjectId, resolver: ModuleId },

    /// The primary resolver reported a fault.
    #[error("resolver {resolver} failed: {reason}")]
    ResolverFailed { resolver: ModuleId, reason: String },

    /// The primary resolver ran over its budget.
    #[error("resolver {resolver} exceeded budget of {limit} units")]
    ResolverOverBudget { resolver: ModuleId, limit: u64 },

    /// The primary resolver refused the candidate owner.
    #[error("resolver {resolver} rejected {candidate} as owner")]
    TransferRejected { resolver: ModuleId, candidate: Address },

    #[error("subject {subject} already has {max} additional resolvers")]
    TooManyResolvers { subject: SubjectId, max: usize },

    #[error("resolver {0} is already attached")]
    DuplicateResolver(ModuleId),

    #[error("resolver {0} is not attached")]
    ResolverNotAttached(ModuleId),

    #[error("resolver {0} is inactive")]
    ResolverInactive(ModuleId),

    #[error("resolver {0} code changed since registration")]
    ResolverIdentityChanged(ModuleId),

    /// An executor is already authorized; use replace.
    #[error("subject {subject} already has executor {executor}")]
    ExecutorAlreadySet { subject: SubjectId, executor: Address },

    #[error("subject {0} has no executor")]
    NoExecutor(SubjectId),

    /// The candidate module declined the delegation.
    #[error("executor {0} declined the delegation")]
    ExecutorRejected(Address),

    /// The emergency window has closed.
    #[error("emergency window closed at {expired_at}")]
    EmergencyExpired { expired_at: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted state could not be reassembled.
    #[error("corrupt persisted state: {0}")]
    Corrupt(String),
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Access(e) => e.kind(),
            KernelError::Registry(e) => e.kind(),
            KernelError::Store(e) => e.kind(),
            KernelError::Governance(e) => e.kind(),
            KernelError::Core(e) => e.kind(),
            KernelError::SubjectNotFound(_) => ErrorKind::NotFound,
            KernelError::SubjectExists(_) => ErrorKind::AlreadyRegistered,
            KernelError::NotOwner { .. } | KernelError::NotOwnerOrExecutor { .. } => {
                ErrorKind::Unauthorized
            }
            KernelError::ResolversLocked(_) => ErrorKind::ResolversLocked,
            KernelError::ResolversNotLocked(_) => ErrorKind::InvalidArgument,
            KernelError::ResolverUnavailable { .. } | KernelError::ResolverFailed { .. } => {
                ErrorKind::ResolverUnavailable
            }
            KernelError::ResolverOverBudget { .. } => ErrorKind::ResourceExceeded,
            KernelError::TransferRejected { .. } => ErrorKind::TransferRejectedByResolver,
            KernelError::TooManyResolvers { .. } => ErrorKind::InvalidArgument,
            KernelError::DuplicateResolver(_) => ErrorKind::AlreadyRegistered,
            KernelError::ResolverNotAttached(_) => ErrorKind::NotFound,
            KernelError::ResolverInactive(_) => ErrorKind::Inactive,
            KernelError::ResolverIdentityChanged(_) => ErrorKind::IdentityChanged,
            KernelError::ExecutorAlreadySet { .. } => ErrorKind::AlreadyRegistered,
            KernelError::NoExecutor(_) => ErrorKind::NotFound,
            KernelError::ExecutorRejected(_) => ErrorKind::Unauthorized,
            KernelError::EmergencyExpired { .. } => ErrorKind::Unauthorized,
            KernelError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            KernelError::Corrupt(_) => ErrorKind::Storage,
        }
    }
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
