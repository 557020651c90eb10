//! Item-level cancellability.
//!
//! A purchased class locks permanently once engagement begins:
//!
//! - `scheduled`: from 00:00 local time on the course start date;
//! - `ongoing`: once the learner has a practice record for that order line.
//!
//! A scheduled class without a start date never locks, and neither does a
//! class the catalog no longer knows about: there is no locking signal to go on.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use classorder_catalog::{ClassDescriptor, CollaboratorError, EnrollmentType, PracticeHistory};
use classorder_core::{BlockReason, ClassId, Ineligibility, OrderId, local_midnight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ItemLock {
    Open,
    LockedByStartDate {
        #[serde(rename = "courseStartDate")]
        course_start_date: NaiveDate,
    },
    LockedByPracticeRecord,
}

impl ItemLock {
    pub fn is_locked(&self) -> bool {
        !matches!(self, ItemLock::Open)
    }

    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            ItemLock::Open => None,
            ItemLock::LockedByStartDate { .. } => Some(BlockReason::LockedByStartDate),
            ItemLock::LockedByPracticeRecord => Some(BlockReason::LockedByPracticeRecord),
        }
    }
}

/// The cancellability of one order line at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAssessment {
    pub class_id: ClassId,
    /// `None` when the catalog had no entry for the class.
    pub enrollment_type: Option<EnrollmentType>,
    pub lock: ItemLock,
}

impl ItemAssessment {
    pub fn open(class_id: ClassId, enrollment_type: Option<EnrollmentType>) -> Self {
        Self {
            class_id,
            enrollment_type,
            lock: ItemLock::Open,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// The refusal to report when this line blocks a cancellation.
    pub fn ineligibility(&self) -> Option<Ineligibility> {
        let reason = self.lock.block_reason()?;
        let detail = match self.lock {
            ItemLock::LockedByStartDate { course_start_date } => format!(
                "scheduled class is confirmed from 00:00 on its start date ({course_start_date}) and can no longer be cancelled"
            ),
            ItemLock::LockedByPracticeRecord => {
                "ongoing class is confirmed once a practice session has been recorded and can no longer be cancelled"
                    .to_string()
            }
            ItemLock::Open => return None,
        };
        Some(Ineligibility::item(reason, self.class_id.clone(), detail))
    }
}

/// `true` once `now` reaches 00:00 (local) of the course start date.
pub fn is_locked_by_start_date(course_start_date: NaiveDate, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    now >= local_midnight(course_start_date, offset)
}

/// Assess one order line against the catalog entry and the practice history.
///
/// The practice history is only consulted for ongoing classes.
pub fn assess_line<P>(
    order_id: &OrderId,
    class_id: &ClassId,
    descriptor: Option<&ClassDescriptor>,
    practice: &P,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<ItemAssessment, CollaboratorError>
where
    P: PracticeHistory + ?Sized,
{
    let Some(descriptor) = descriptor else {
        return Ok(ItemAssessment::open(class_id.clone(), None));
    };

    let lock = match descriptor.enrollment_type {
        EnrollmentType::Scheduled => match descriptor.course_start_date {
            Some(start) if is_locked_by_start_date(start, now, offset) => {
                ItemLock::LockedByStartDate {
                    course_start_date: start,
                }
            }
            _ => ItemLock::Open,
        },
        EnrollmentType::Ongoing => {
            if practice.has_practice_record(order_id, class_id)? {
                ItemLock::LockedByPracticeRecord
            } else {
                ItemLock::Open
            }
        }
    };

    Ok(ItemAssessment {
        class_id: class_id.clone(),
        enrollment_type: Some(descriptor.enrollment_type),
        lock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use classorder_catalog::InMemoryPracticeHistory;
    use classorder_core::Money;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn scheduled_class_locks_at_local_midnight() {
        // 2026-03-02 00:00 KST == 2026-03-01 15:00 UTC.
        let just_before = Utc.with_ymd_and_hms(2026, 3, 1, 14, 59, 59).unwrap();
        let at_midnight = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        assert!(!is_locked_by_start_date(start(), just_before, kst()));
        assert!(is_locked_by_start_date(start(), at_midnight, kst()));
    }

    #[test]
    fn scheduled_without_start_date_never_locks() {
        let mut d = ClassDescriptor::scheduled("001", Money::new(1_000), start());
        d.course_start_date = None;
        let practice = InMemoryPracticeHistory::new();
        let far_future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();

        let a = assess_line(&OrderId::from("o"), &d.class_id, Some(&d), &practice, far_future, kst())
            .unwrap();
        assert_eq!(a.lock, ItemLock::Open);
        assert_eq!(a.enrollment_type, Some(EnrollmentType::Scheduled));
    }

    #[test]
    fn ongoing_class_locks_on_practice_record() {
        let d = ClassDescriptor::ongoing("003", Money::new(1_000));
        let practice = InMemoryPracticeHistory::new();
        let order_id = OrderId::from("ORD-1");
        let now = Utc::now();

        let a = assess_line(&order_id, &d.class_id, Some(&d), &practice, now, kst()).unwrap();
        assert!(!a.is_locked());

        practice.record(order_id.clone(), d.class_id.clone());
        let a = assess_line(&order_id, &d.class_id, Some(&d), &practice, now, kst()).unwrap();
        assert_eq!(a.lock, ItemLock::LockedByPracticeRecord);
        let refusal = a.ineligibility().unwrap();
        assert_eq!(refusal.reason, BlockReason::LockedByPracticeRecord);
        assert_eq!(refusal.class_id, Some(ClassId::from("003")));
    }

    #[test]
    fn missing_catalog_entry_is_cancellable() {
        let practice = InMemoryPracticeHistory::new();
        let a = assess_line(&OrderId::from("o"), &ClassId::from("gone"), None, &practice, Utc::now(), kst())
            .unwrap();
        assert_eq!(a.lock, ItemLock::Open);
        assert_eq!(a.enrollment_type, None);
        assert!(a.ineligibility().is_none());
    }

    #[test]
    fn practice_history_outage_propagates() {
        let d = ClassDescriptor::ongoing("003", Money::new(1_000));
        let practice = InMemoryPracticeHistory::new();
        practice.set_available(false);
        let res = assess_line(&OrderId::from("o"), &d.class_id, Some(&d), &practice, Utc::now(), kst());
        assert!(matches!(res, Err(CollaboratorError::Unavailable(_))));
    }
}
