//! Per-learner participation status, persisted as one `MyClassStatus` map per
//! learner.
//!
//! This is the single authoritative status store; the legacy "participating"
//! flag is derived from it by [`EnrollmentStatusTracker::is_participating_or_beyond`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use classorder_catalog::ClassCatalog;
use classorder_core::{ClassId, Clock, ExpectedVersion, LearnerId};
use classorder_enrollment::{
    CompletionRate, DisplayStatus, MyClassStatuses, StoredStatus, display_status, merge,
};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry;
use crate::store::{DocumentStore, Versioned};

pub struct EnrollmentStatusTracker<S, C> {
    statuses: S,
    catalog: C,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S, C> EnrollmentStatusTracker<S, C>
where
    S: DocumentStore<LearnerId, MyClassStatuses>,
    C: ClassCatalog,
{
    pub fn new(statuses: S, catalog: C, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            statuses,
            catalog,
            clock,
            config,
        }
    }

    /// Seed a purchased class. Never downgrades an existing record.
    pub fn mark_eligible(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<StoredStatus> {
        self.raise(learner_id, class_id, StoredStatus::Eligible)
    }

    /// Seed every class of an order in one write.
    pub fn mark_eligible_all(&self, learner_id: &LearnerId, class_ids: &[ClassId]) -> EngineResult<()> {
        self.update(learner_id, "enrollment.mark_eligible", |map| {
            let mut changed = false;
            for class_id in class_ids {
                changed |= raise_in(map, class_id, StoredStatus::Eligible);
            }
            changed
        })
    }

    /// The learner started a session or accepted an invitation.
    /// A completed class stays completed.
    pub fn mark_participating(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<StoredStatus> {
        self.raise(learner_id, class_id, StoredStatus::Participating)
    }

    /// Mark the class completed once `rate` reaches 100. Below that this is a
    /// no-op: progress never lowers a status.
    ///
    /// Returns the stored status afterwards, if any.
    pub fn recompute_completion(
        &self,
        learner_id: &LearnerId,
        class_id: &ClassId,
        rate: u8,
    ) -> EngineResult<Option<StoredStatus>> {
        let rate = CompletionRate::new(rate)?;
        if !rate.is_complete() {
            tracing::debug!(learner_id = %learner_id, class_id = %class_id, rate = rate.percent(), "completion below threshold");
            return self.stored(learner_id, class_id);
        }
        self.raise(learner_id, class_id, StoredStatus::Completed).map(Some)
    }

    pub fn stored(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<Option<StoredStatus>> {
        Ok(self.statuses(learner_id)?.get(class_id).copied())
    }

    /// The learner's whole status map (empty if nothing was ever recorded).
    pub fn statuses(&self, learner_id: &LearnerId) -> EngineResult<MyClassStatuses> {
        Ok(self
            .statuses
            .get(learner_id)?
            .map(|doc| doc.value)
            .unwrap_or_default())
    }

    /// Learner-facing status at `now`. Reads only.
    pub fn display_status(
        &self,
        learner_id: &LearnerId,
        class_id: &ClassId,
        now: DateTime<Utc>,
    ) -> EngineResult<DisplayStatus> {
        let stored = self.stored(learner_id, class_id)?;
        // Without a stored record the period end cannot change the answer.
        let period_end = match stored {
            Some(_) => self
                .catalog
                .get(class_id)?
                .and_then(|c| c.participation_period_end),
            None => None,
        };
        Ok(display_status(stored, period_end, now, self.config.local_offset))
    }

    /// [`Self::display_status`] at the engine clock's current time.
    pub fn display_status_now(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<DisplayStatus> {
        self.display_status(learner_id, class_id, self.clock.now())
    }

    /// Legacy boolean view: participating or completed.
    pub fn is_participating_or_beyond(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<bool> {
        Ok(self
            .stored(learner_id, class_id)?
            .is_some_and(|s| s >= StoredStatus::Participating))
    }

    fn raise(&self, learner_id: &LearnerId, class_id: &ClassId, target: StoredStatus) -> EngineResult<StoredStatus> {
        let operation = match target {
            StoredStatus::Eligible => "enrollment.mark_eligible",
            StoredStatus::Participating => "enrollment.mark_participating",
            StoredStatus::Completed => "enrollment.complete",
        };
        self.update(learner_id, operation, |map| raise_in(map, class_id, target))?;
        // Stored value is at least `target` now; report what is actually there.
        Ok(self.stored(learner_id, class_id)?.unwrap_or(target))
    }

    /// Read-modify-write of the learner's map. `modify` returns whether it
    /// changed anything; unchanged maps are not written.
    fn update(
        &self,
        learner_id: &LearnerId,
        operation: &'static str,
        modify: impl Fn(&mut MyClassStatuses) -> bool,
    ) -> EngineResult<()> {
        retry::on_conflict(operation, self.config.max_conflict_retries, || {
            let current = self.statuses.get(learner_id)?;
            let (mut map, expected, version) = match current {
                Some(doc) => (doc.value, ExpectedVersion::Exact(doc.version), doc.version),
                None => (MyClassStatuses::new(), ExpectedVersion::NoDocument, 0),
            };

            if !modify(&mut map) {
                tracing::debug!(learner_id = %learner_id, operation, "status unchanged");
                return Ok(());
            }

            self.statuses
                .put(learner_id.clone(), Versioned::new(map, version + 1), expected)?;
            tracing::info!(learner_id = %learner_id, operation, "enrollment status updated");
            Ok(())
        })
    }
}

fn raise_in(map: &mut MyClassStatuses, class_id: &ClassId, target: StoredStatus) -> bool {
    match merge(map.get(class_id).copied(), target) {
        Some(next) => {
            map.insert(class_id.clone(), next);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use classorder_catalog::{ClassDescriptor, InMemoryClassCatalog};
    use classorder_core::{FixedClock, Money};

    use crate::error::EngineError;
    use crate::store::InMemoryDocumentStore;

    type TestTracker = EnrollmentStatusTracker<
        Arc<InMemoryDocumentStore<LearnerId, MyClassStatuses>>,
        Arc<InMemoryClassCatalog>,
    >;

    fn tracker() -> (TestTracker, Arc<InMemoryDocumentStore<LearnerId, MyClassStatuses>>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let catalog = Arc::new(InMemoryClassCatalog::with_classes([ClassDescriptor::ongoing(
            "c1",
            Money::new(10_000),
        )
        .with_participation_period_end(NaiveDate::from_ymd_opt(2026, 6, 30).unwrap())]));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        (
            EnrollmentStatusTracker::new(store.clone(), catalog, clock, EngineConfig::default()),
            store,
        )
    }

    fn learner() -> LearnerId {
        LearnerId::from("learner-1")
    }

    #[test]
    fn statuses_only_move_forward() {
        let (t, _) = tracker();
        let class = ClassId::from("c1");

        assert_eq!(t.mark_eligible(&learner(), &class).unwrap(), StoredStatus::Eligible);
        assert_eq!(t.mark_participating(&learner(), &class).unwrap(), StoredStatus::Participating);
        assert_eq!(t.mark_eligible(&learner(), &class).unwrap(), StoredStatus::Participating);
        assert_eq!(
            t.recompute_completion(&learner(), &class, 100).unwrap(),
            Some(StoredStatus::Completed)
        );
        assert_eq!(t.mark_participating(&learner(), &class).unwrap(), StoredStatus::Completed);
        assert_eq!(
            t.recompute_completion(&learner(), &class, 40).unwrap(),
            Some(StoredStatus::Completed)
        );
    }

    #[test]
    fn no_op_writes_leave_the_version_alone() {
        let (t, store) = tracker();
        let class = ClassId::from("c1");
        t.mark_participating(&learner(), &class).unwrap();
        t.mark_eligible(&learner(), &class).unwrap();
        t.mark_participating(&learner(), &class).unwrap();
        assert_eq!(store.get(&learner()).unwrap().unwrap().version, 1);
    }

    #[test]
    fn partial_progress_does_not_create_a_record() {
        let (t, _) = tracker();
        let class = ClassId::from("c1");
        assert_eq!(t.recompute_completion(&learner(), &class, 99).unwrap(), None);
        assert!(t.statuses(&learner()).unwrap().is_empty());
    }

    #[test]
    fn rates_above_one_hundred_are_rejected() {
        let (t, _) = tracker();
        let err = t
            .recompute_completion(&learner(), &ClassId::from("c1"), 101)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn display_status_derives_ended_without_writing() {
        let (t, store) = tracker();
        let class = ClassId::from("c1");
        t.mark_participating(&learner(), &class).unwrap();

        let before_end = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let after_end = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(t.display_status(&learner(), &class, before_end).unwrap(), DisplayStatus::Participating);
        assert_eq!(t.display_status(&learner(), &class, after_end).unwrap(), DisplayStatus::Ended);
        assert_eq!(t.display_status(&learner(), &class, after_end).unwrap(), DisplayStatus::Ended);

        let doc = store.get(&learner()).unwrap().unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.value.get(&class), Some(&StoredStatus::Participating));
    }

    #[test]
    fn unknown_learner_displays_eligible() {
        let (t, _) = tracker();
        assert_eq!(
            t.display_status_now(&learner(), &ClassId::from("c1")).unwrap(),
            DisplayStatus::Eligible
        );
        assert!(!t.is_participating_or_beyond(&learner(), &ClassId::from("c1")).unwrap());
    }

    #[test]
    fn seeding_an_order_writes_once() {
        let (t, store) = tracker();
        let classes = [ClassId::from("a"), ClassId::from("b")];
        t.mark_participating(&learner(), &classes[0]).unwrap();
        t.mark_eligible_all(&learner(), &classes).unwrap();

        let doc = store.get(&learner()).unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.value.get(&classes[0]), Some(&StoredStatus::Participating));
        assert_eq!(doc.value.get(&classes[1]), Some(&StoredStatus::Eligible));
        assert!(t.is_participating_or_beyond(&learner(), &classes[0]).unwrap());
    }
}
