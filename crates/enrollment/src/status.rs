use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use classorder_core::{ClassId, DomainError, DomainResult, local_midnight};

/// Persisted participation status.
///
/// Variant order is the progression order: `Eligible < Participating < Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredStatus {
    /// Purchased (or registered); not started yet.
    Eligible,
    /// Started a session or accepted an invitation.
    Participating,
    /// Met the completion requirements; certificate available.
    Completed,
}

/// Learner-facing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Eligible,
    Participating,
    Completed,
    /// The participation period is over. Never stored.
    Ended,
}

impl DisplayStatus {
    /// Label shown in the learner UI.
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::Eligible => "참여가능",
            DisplayStatus::Participating => "참여중",
            DisplayStatus::Completed => "이수완료",
            DisplayStatus::Ended => "종료",
        }
    }
}

impl From<StoredStatus> for DisplayStatus {
    fn from(value: StoredStatus) -> Self {
        match value {
            StoredStatus::Eligible => DisplayStatus::Eligible,
            StoredStatus::Participating => DisplayStatus::Participating,
            StoredStatus::Completed => DisplayStatus::Completed,
        }
    }
}

/// A learner's status map, persisted as `{ "<classId>": "<status>" }`.
pub type MyClassStatuses = BTreeMap<ClassId, StoredStatus>;

/// Monotonic merge: the status to write, or `None` when `target` would not
/// move `current` forward.
pub fn merge(current: Option<StoredStatus>, target: StoredStatus) -> Option<StoredStatus> {
    match current {
        Some(existing) if existing >= target => None,
        _ => Some(target),
    }
}

/// Course completion percentage, `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompletionRate(u8);

impl CompletionRate {
    pub fn new(percent: u8) -> DomainResult<Self> {
        if percent > 100 {
            return Err(DomainError::validation(format!(
                "completion rate must be between 0 and 100 (got {percent})"
            )));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 >= 100
    }
}

impl TryFrom<u8> for CompletionRate {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompletionRate> for u8 {
    fn from(value: CompletionRate) -> Self {
        value.0
    }
}

/// Derive the learner-facing status. Pure: reads its arguments, writes nothing.
///
/// - no stored record: `Eligible`;
/// - past the participation period end: `Ended`;
/// - otherwise the stored status.
///
/// The period end is a calendar date, compared at 00:00 local time.
pub fn display_status(
    stored: Option<StoredStatus>,
    participation_period_end: Option<NaiveDate>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> DisplayStatus {
    let Some(stored) = stored else {
        return DisplayStatus::Eligible;
    };
    match participation_period_end {
        Some(end) if now > local_midnight(end, offset) => DisplayStatus::Ended,
        _ => stored.into(),
    }
}
