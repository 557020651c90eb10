use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use classorder_core::{ClassId, OrderId};

use crate::error::CollaboratorError;

/// Whether a learner started a simulation session for an order line.
///
/// Records are append-only on the collaborator's side: once `true`, a line
/// stays `true`.
pub trait PracticeHistory: Send + Sync {
    fn has_practice_record(
        &self,
        order_id: &OrderId,
        class_id: &ClassId,
    ) -> Result<bool, CollaboratorError>;
}

impl<P> PracticeHistory for Arc<P>
where
    P: PracticeHistory + ?Sized,
{
    fn has_practice_record(
        &self,
        order_id: &OrderId,
        class_id: &ClassId,
    ) -> Result<bool, CollaboratorError> {
        (**self).has_practice_record(order_id, class_id)
    }
}

/// In-memory practice log for tests/dev.
#[derive(Debug)]
pub struct InMemoryPracticeHistory {
    records: RwLock<HashSet<(OrderId, ClassId)>>,
    available: AtomicBool,
}

impl InMemoryPracticeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, order_id: OrderId, class_id: ClassId) {
        if let Ok(mut set) = self.records.write() {
            set.insert((order_id, class_id));
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for InMemoryPracticeHistory {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashSet::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl PracticeHistory for InMemoryPracticeHistory {
    fn has_practice_record(
        &self,
        order_id: &OrderId,
        class_id: &ClassId,
    ) -> Result<bool, CollaboratorError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("practice history offline"));
        }
        let set = self
            .records
            .read()
            .map_err(|_| CollaboratorError::unavailable("practice history lock poisoned"))?;
        Ok(set.contains(&(order_id.clone(), class_id.clone())))
    }
}
