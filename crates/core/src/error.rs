//! Domain error model.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ClassId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Why a cancellation was refused.
///
/// The serialized names are part of the external contract (UI layers switch on
/// them), so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    /// A scheduled class reached its course start date.
    LockedByStartDate,
    /// An ongoing class has at least one recorded practice session.
    LockedByPracticeRecord,
    /// The whole order was locked in (`CONFIRMED`).
    OrderConfirmed,
    /// The order was already cancelled; there is nothing left to cancel.
    OrderCancelled,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::LockedByStartDate => "locked-by-start-date",
            BlockReason::LockedByPracticeRecord => "locked-by-practice-record",
            BlockReason::OrderConfirmed => "order-confirmed",
            BlockReason::OrderCancelled => "order-cancelled",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused cancellation: the reason plus the blocking line item, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ineligibility {
    pub reason: BlockReason,
    /// The line item that blocked the request. `None` for order-level reasons.
    pub class_id: Option<ClassId>,
    /// Human-readable cause, specific to the class's enrollment type.
    pub detail: String,
}

impl Ineligibility {
    pub fn order(reason: BlockReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            class_id: None,
            detail: detail.into(),
        }
    }

    pub fn item(reason: BlockReason, class_id: ClassId, detail: impl Into<String>) -> Self {
        Self {
            reason,
            class_id: Some(class_id),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class_id {
            Some(class_id) => write!(f, "{} (class {class_id}): {}", self.reason, self.detail),
            None => write!(f, "{}: {}", self.reason, self.detail),
        }
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, eligibility, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty selection, bad quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. blank).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A cancellation was refused by the eligibility rules.
    #[error("not cancellable: {0}")]
    Ineligible(Ineligibility),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn ineligible(ineligibility: Ineligibility) -> Self {
        Self::Ineligible(ineligibility)
    }

    /// The blocking reason, when this is an eligibility refusal.
    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            DomainError::Ineligible(i) => Some(i.reason),
            _ => None,
        }
    }
}
