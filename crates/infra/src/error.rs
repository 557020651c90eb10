//! Service-level error model.

use thiserror::Error;

use classorder_catalog::CollaboratorError;
use classorder_core::{BlockReason, ClassId, DomainError, Ineligibility};

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Rejected input; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("checkout selection is empty")]
    EmptySelection,

    /// A cancellation was refused. Carries the blocking reason.
    #[error("not cancellable: {0}")]
    Ineligible(Ineligibility),

    /// A compare-and-set lost against a concurrent writer. Re-read and retry.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Classes that the catalog does not know. Lists every missing id.
    #[error("classes not found in catalog: {}", join_ids(.0))]
    CatalogLookup(Vec<ClassId>),

    /// The catalog or the practice history did not answer.
    #[error("collaborator unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("not found")]
    NotFound,

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrentModification(_)
                | EngineError::CatalogLookup(_)
                | EngineError::CatalogUnavailable(_)
        )
    }

    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            EngineError::Ineligible(i) => Some(i.reason),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification(_))
    }
}

fn join_ids(ids: &[ClassId]) -> String {
    ids.iter().map(ClassId::as_str).collect::<Vec<_>>().join(", ")
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::InvariantViolation(msg) => EngineError::Invariant(msg),
            DomainError::NotFound => EngineError::NotFound,
            DomainError::Conflict(msg) => EngineError::ConcurrentModification(msg),
            DomainError::Ineligible(i) => EngineError::Ineligible(i),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => EngineError::ConcurrentModification(msg),
            other => EngineError::Store(other),
        }
    }
}

impl From<CollaboratorError> for EngineError {
    fn from(value: CollaboratorError) -> Self {
        match value {
            CollaboratorError::Unavailable(msg) => EngineError::CatalogUnavailable(msg),
        }
    }
}
