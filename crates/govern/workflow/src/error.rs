use govern_ledger::LedgerError;
use govern_storage::StorageError;
use govern_types::{EntityKind, PayloadError};
use thiserror::Error;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors returned to callers of the workflow engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{actor} is not permitted to {action}")]
    Unauthorized { actor: String, action: String },

    #[error("uniqueness conflict: {0}")]
    UniquenessConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for WorkflowError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Conflict(msg) => Self::UniquenessConflict(msg),
            StorageError::InvariantViolation(msg) => Self::AlreadyResolved(msg),
            StorageError::InvalidInput(msg) => Self::InvalidPayload(msg),
            StorageError::Serialization(msg) | StorageError::Backend(msg) => Self::Storage(msg),
        }
    }
}

impl From<LedgerError> for WorkflowError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(msg) => Self::NotFound(msg),
            LedgerError::AlreadyResolved(msg) => Self::AlreadyResolved(msg),
            LedgerError::Backend(msg) => Self::Storage(msg),
        }
    }
}

impl From<PayloadError> for WorkflowError {
    fn from(value: PayloadError) -> Self {
        Self::InvalidPayload(value.to_string())
    }
}

/// Why replaying a payload against the entity store did not take effect.
///
/// During approval these become a `failed` task with the message kept as
/// failure detail. On the direct path they convert into a `WorkflowError`.
#[derive(Debug, Error)]
pub enum ReplayFailure {
    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    MissingEntity { entity: EntityKind, id: i64 },

    #[error("{0} task carries no entity id")]
    MissingTarget(EntityKind),

    #[error("bulk upload carries no records")]
    EmptyBatch,

    #[error("malformed payload: {0}")]
    Malformed(#[from] PayloadError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StorageError> for ReplayFailure {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<ReplayFailure> for WorkflowError {
    fn from(value: ReplayFailure) -> Self {
        match value {
            ReplayFailure::Conflict(msg) => Self::UniquenessConflict(msg),
            missing @ ReplayFailure::MissingEntity { .. } => Self::NotFound(missing.to_string()),
            invalid @ (ReplayFailure::MissingTarget(_)
            | ReplayFailure::EmptyBatch
            | ReplayFailure::Malformed(_)) => Self::InvalidPayload(invalid.to_string()),
            ReplayFailure::Storage(msg) => Self::Storage(msg),
        }
    }
}
