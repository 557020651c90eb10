//! Checkout: cart selection -> order -> enrollment seeding -> cart cleanup.
//!
//! Order creation is all-or-nothing: every validation and catalog lookup runs
//! before anything is written. The two follow-up steps are idempotent and a
//! failure there is logged rather than reported, because the order already
//! exists and a class with no status record already displays as eligible.

use serde::{Deserialize, Serialize};

use classorder_cart::{Cart, CartEntry, MAX_QUANTITY, MIN_QUANTITY};
use classorder_catalog::{ClassCatalog, ClassDescriptor, PracticeHistory};
use classorder_core::{AggregateRoot, ClassId, LearnerId, Money, OrderId};
use classorder_enrollment::MyClassStatuses;
use classorder_events::EventBus;
use classorder_orders::{Order, OrderLineItem, OrderRecord, PaymentMethod};

use crate::cart_store::CartStore;
use crate::enrollment_tracker::EnrollmentStatusTracker;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{OrderEnvelope, OrderLedger};
use crate::store::DocumentStore;

/// Totals shown for a selection before payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// `Σ price × quantity` at list price.
    pub list_total: Money,
    /// How much the discount prices save against the list total.
    pub discount_total: Money,
    /// What the learner pays: `Σ effective_price × quantity`.
    pub payable: Money,
}

pub struct CheckoutCoordinator<'a, OS, ES, KS, C, P, B> {
    ledger: &'a OrderLedger<OS, C, P, B>,
    tracker: &'a EnrollmentStatusTracker<ES, C>,
    carts: &'a CartStore<KS>,
}

impl<'a, OS, ES, KS, C, P, B> CheckoutCoordinator<'a, OS, ES, KS, C, P, B>
where
    OS: DocumentStore<OrderId, OrderRecord>,
    ES: DocumentStore<LearnerId, MyClassStatuses>,
    KS: DocumentStore<LearnerId, Cart>,
    C: ClassCatalog,
    P: PracticeHistory,
    B: EventBus<OrderEnvelope>,
{
    pub fn new(
        ledger: &'a OrderLedger<OS, C, P, B>,
        tracker: &'a EnrollmentStatusTracker<ES, C>,
        carts: &'a CartStore<KS>,
    ) -> Self {
        Self {
            ledger,
            tracker,
            carts,
        }
    }

    /// Purchase `selection` and return the new order (in `PROCESSING`).
    ///
    /// Unit prices are snapshotted from the catalog (discount price when set).
    pub fn checkout(
        &self,
        learner_id: &LearnerId,
        selection: &[CartEntry],
        payment_method: PaymentMethod,
        refund_policy_agreed: bool,
    ) -> EngineResult<Order> {
        validate_selection(selection)?;
        if !refund_policy_agreed {
            return Err(EngineError::Validation(
                "the refund policy must be agreed to before payment".to_string(),
            ));
        }

        let line_items = self
            .resolve(selection)?
            .into_iter()
            .map(|(entry, class)| {
                OrderLineItem::new(entry.class_id.clone(), entry.quantity, class.effective_price())
            })
            .collect::<Vec<_>>();
        let purchased: Vec<ClassId> = line_items.iter().map(|l| l.class_id.clone()).collect();

        let order = self
            .ledger
            .place(learner_id.clone(), line_items, payment_method)?;

        if let Err(e) = self.tracker.mark_eligible_all(learner_id, &purchased) {
            tracing::warn!(order_id = %order.id(), learner_id = %learner_id, error = %e, "failed to seed enrollment status");
        }
        if let Err(e) = self.carts.clear(learner_id, &purchased) {
            tracing::warn!(order_id = %order.id(), learner_id = %learner_id, error = %e, "failed to clear purchased classes from cart");
        }

        tracing::info!(order_id = %order.id(), learner_id = %learner_id, classes = purchased.len(), "checkout completed");
        Ok(order)
    }

    /// Price a selection at current catalog prices. Nothing is written.
    pub fn quote(&self, selection: &[CartEntry]) -> EngineResult<Quote> {
        let mut list_total = Money::ZERO;
        let mut payable = Money::ZERO;
        for (entry, class) in self.resolve(selection)? {
            list_total = list_total.checked_add(class.price.checked_mul(entry.quantity)?)?;
            payable = payable.checked_add(class.effective_price().checked_mul(entry.quantity)?)?;
        }
        Ok(Quote {
            list_total,
            discount_total: list_total.saturating_sub(payable),
            payable,
        })
    }

    /// Look up every class. Reports all missing ids at once; an outage aborts.
    fn resolve<'s>(&self, selection: &'s [CartEntry]) -> EngineResult<Vec<(&'s CartEntry, ClassDescriptor)>> {
        let mut resolved = Vec::with_capacity(selection.len());
        let mut missing = Vec::new();

        for entry in selection {
            match self.ledger.catalog().get(&entry.class_id)? {
                Some(class) => resolved.push((entry, class)),
                None => missing.push(entry.class_id.clone()),
            }
        }

        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "selection names classes missing from the catalog");
            return Err(EngineError::CatalogLookup(missing));
        }
        Ok(resolved)
    }
}

fn validate_selection(selection: &[CartEntry]) -> EngineResult<()> {
    if selection.is_empty() {
        return Err(EngineError::EmptySelection);
    }

    for (idx, entry) in selection.iter().enumerate() {
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&entry.quantity) {
            return Err(EngineError::Validation(format!(
                "quantity for class {} must be between {MIN_QUANTITY} and {MAX_QUANTITY} (got {})",
                entry.class_id, entry.quantity
            )));
        }
        if selection[..idx].iter().any(|e| e.class_id == entry.class_id) {
            return Err(EngineError::Validation(format!(
                "class {} is selected more than once",
                entry.class_id
            )));
        }
    }
    Ok(())
}
