use serde_json::Value as JsonValue;

use classorder_cart::{Cart, CartEntry};
use classorder_core::{ClassId, ExpectedVersion, LearnerId};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry;
use crate::store::{DocumentStore, Versioned};

/// Per-learner cart persistence. Edits are read-modify-write with retry.
///
/// An emptied cart is stored empty rather than deleted, so its version keeps
/// counting up and a writer holding an older read always loses.
pub struct CartStore<S> {
    carts: S,
    config: EngineConfig,
}

impl<S> CartStore<S>
where
    S: DocumentStore<LearnerId, Cart>,
{
    pub fn new(carts: S, config: EngineConfig) -> Self {
        Self { carts, config }
    }

    pub fn list(&self, learner_id: &LearnerId) -> EngineResult<Vec<CartEntry>> {
        Ok(self.load(learner_id)?.entries().to_vec())
    }

    pub fn add(&self, learner_id: &LearnerId, class_id: &ClassId, quantity: i64) -> EngineResult<()> {
        self.modify(learner_id, "cart.add", |cart| {
            cart.add(class_id.clone(), quantity);
            true
        })
        .map(|_| ())
    }

    pub fn remove(&self, learner_id: &LearnerId, class_id: &ClassId) -> EngineResult<bool> {
        self.modify(learner_id, "cart.remove", |cart| cart.remove(class_id))
    }

    /// No-op (returns `false`) when the class is not in the cart.
    pub fn set_quantity(&self, learner_id: &LearnerId, class_id: &ClassId, quantity: i64) -> EngineResult<bool> {
        self.modify(learner_id, "cart.set_quantity", |cart| {
            cart.set_quantity(class_id, quantity)
        })
    }

    /// Remove only the listed classes. Returns how many entries were removed.
    pub fn clear(&self, learner_id: &LearnerId, class_ids: &[ClassId]) -> EngineResult<usize> {
        let mut removed = 0;
        self.modify(learner_id, "cart.clear", |cart| {
            removed = cart.clear(class_ids);
            removed > 0
        })?;
        Ok(removed)
    }

    /// Replace the learner's cart with one parsed from a persisted JSON value
    /// (including the legacy bare-id format).
    pub fn import(&self, learner_id: &LearnerId, value: &JsonValue) -> EngineResult<Vec<CartEntry>> {
        let imported = Cart::from_json(value);
        self.modify(learner_id, "cart.import", |cart| {
            let changed = *cart != imported;
            *cart = imported.clone();
            changed
        })?;
        Ok(imported.entries().to_vec())
    }

    fn load(&self, learner_id: &LearnerId) -> EngineResult<Cart> {
        Ok(self
            .carts
            .get(learner_id)?
            .map(|doc| doc.value)
            .unwrap_or_default())
    }

    fn modify(
        &self,
        learner_id: &LearnerId,
        operation: &'static str,
        mut edit: impl FnMut(&mut Cart) -> bool,
    ) -> EngineResult<bool> {
        retry::on_conflict(operation, self.config.max_conflict_retries, || {
            let current = self.carts.get(learner_id)?;
            let (mut cart, expected, version) = match current {
                Some(doc) => (doc.value, ExpectedVersion::Exact(doc.version), doc.version),
                None => (Cart::new(), ExpectedVersion::NoDocument, 0),
            };

            if !edit(&mut cart) {
                tracing::debug!(learner_id = %learner_id, operation, "cart unchanged");
                return Ok(false);
            }

            self.carts
                .put(learner_id.clone(), Versioned::new(cart, version + 1), expected)?;
            tracing::debug!(learner_id = %learner_id, operation, "cart updated");
            Ok(true)
        })
    }
}
