//! Order ledger: owns `Order` documents and drives their state machine.
//!
//! Every transition follows the same pipeline:
//!
//! ```text
//! load record (version v)
//!   -> resolve item assessments (catalog, practice history, clock)
//!   -> Order::handle(command)     (pure decision)
//!   -> Order::apply(events)
//!   -> put record, expecting v    (compare-and-set)
//!   -> publish events             (after commit)
//! ```
//!
//! User cancellations surface a lost compare-and-set as
//! [`EngineError::ConcurrentModification`]. Placement and automatic
//! transitions retry it internally.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use classorder_catalog::{ClassCatalog, PracticeHistory};
use classorder_core::{
    Aggregate, AggregateRoot, ClassId, Clock, DomainError, ExpectedVersion, LearnerId, Money,
    OrderId,
};
use classorder_events::{EventBus, EventEnvelope};
use classorder_orders::{
    Advanced, CancelItems, CancelOrder, CancellationPreview, ItemAssessment, Order, OrderCommand,
    OrderEvent, OrderLineItem, OrderRecord, OrderStatus, PaymentMethod, PlaceOrder, assess_line,
    lifecycle, preview_cancellation,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::retry;
use crate::store::{DocumentStore, Versioned};

/// `aggregate_type` stamped on published order envelopes.
pub const ORDER_AGGREGATE_TYPE: &str = "classorder.order";

pub type OrderEnvelope = EventEnvelope<OrderEvent>;

/// Result of a full cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled { order: Order, refund: Money },
    /// The order was already cancelled; nothing changed.
    AlreadyCancelled { order: Order },
}

impl CancelOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CancelOutcome::Cancelled { order, .. } | CancelOutcome::AlreadyCancelled { order } => {
                order
            }
        }
    }

    pub fn refund(&self) -> Money {
        match self {
            CancelOutcome::Cancelled { refund, .. } => *refund,
            CancelOutcome::AlreadyCancelled { .. } => Money::ZERO,
        }
    }

    pub fn is_already_cancelled(&self) -> bool {
        matches!(self, CancelOutcome::AlreadyCancelled { .. })
    }
}

/// Result of a partial cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCancellation {
    /// The order after the removal. `CANCELLED` iff no lines remain.
    pub order: Order,
    pub cancelled: Vec<OrderLineItem>,
    pub refund: Money,
}

/// Outcome of one scheduler sweep.
#[derive(Debug, Default)]
pub struct AdvanceReport {
    /// Orders that moved to a new status.
    pub advanced: Vec<OrderId>,
    pub unchanged: usize,
    /// Orders whose transition failed; the sweep carries on past them. A due
    /// settlement is committed even when the lock-in after it fails.
    pub failed: Vec<(OrderId, EngineError)>,
}

pub struct OrderLedger<S, C, P, B> {
    orders: S,
    catalog: C,
    practice: P,
    bus: B,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S, C, P, B> OrderLedger<S, C, P, B> {
    pub fn new(
        orders: S,
        catalog: C,
        practice: P,
        bus: B,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            orders,
            catalog,
            practice,
            bus,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl<S, C, P, B> OrderLedger<S, C, P, B>
where
    S: DocumentStore<OrderId, OrderRecord>,
    C: ClassCatalog,
    P: PracticeHistory,
    B: EventBus<OrderEnvelope>,
{
    /// Create a new order in `PROCESSING` with a fresh order id.
    ///
    /// Line items must already carry their snapshotted unit prices.
    pub fn place(
        &self,
        learner_id: LearnerId,
        line_items: Vec<OrderLineItem>,
        payment_method: PaymentMethod,
    ) -> EngineResult<Order> {
        // A retry only happens on an order-id collision; each attempt draws a new id.
        retry::on_conflict("order.place", self.config.max_conflict_retries, || {
            let now = self.clock.now();
            let order = Order::empty(OrderId::generate(now, self.config.local_offset));

            let events = order.handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: order.id().clone(),
                learner_id: learner_id.clone(),
                order_date: now,
                line_items: line_items.clone(),
                payment_method,
            }))?;

            let placed = self.commit(&order, events)?;
            tracing::info!(
                order_id = %placed.id(),
                learner_id = %learner_id,
                lines = placed.line_items().len(),
                total = %placed.total_amount(),
                "order placed"
            );
            Ok(placed)
        })
    }

    pub fn get(&self, order_id: &OrderId) -> EngineResult<Order> {
        let doc = self.orders.get(order_id)?.ok_or(EngineError::NotFound)?;
        Ok(Order::from_record(doc.value, doc.version)?)
    }

    pub fn status(&self, order_id: &OrderId) -> EngineResult<OrderStatus> {
        Ok(self.get(order_id)?.status())
    }

    /// A learner's orders, newest first.
    pub fn orders_for(&self, learner_id: &LearnerId) -> EngineResult<Vec<Order>> {
        let mut orders = self
            .orders
            .list()?
            .into_iter()
            .filter(|(_, doc)| &doc.value.learner_id == learner_id)
            .map(|(_, doc)| Order::from_record(doc.value, doc.version))
            .collect::<Result<Vec<_>, DomainError>>()?;

        orders.sort_by(|a, b| {
            b.order_date()
                .cmp(&a.order_date())
                .then_with(|| b.id().cmp(a.id()))
        });
        Ok(orders)
    }

    /// Cancel every line of the order, or none.
    ///
    /// A second call on a cancelled order is a no-op that reports
    /// [`CancelOutcome::AlreadyCancelled`].
    pub fn cancel_order(&self, order_id: &OrderId) -> EngineResult<CancelOutcome> {
        let order = self.get(order_id)?;
        if order.status() == OrderStatus::Cancelled {
            tracing::debug!(order_id = %order_id, "order already cancelled");
            return Ok(CancelOutcome::AlreadyCancelled { order });
        }

        let now = self.clock.now();
        let assessments = if order.status().accepts_cancellation() {
            self.assess(&order, order.line_items(), now)?
        } else {
            Vec::new()
        };

        let events = order
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order_id.clone(),
                assessments,
                occurred_at: now,
            }))
            .map_err(|e| refused(order_id, e))?;

        let refund: Money = events.iter().filter_map(OrderEvent::refund).sum();
        let order = self.commit(&order, events)?;
        tracing::info!(order_id = %order_id, refund = %refund, "order cancelled");

        Ok(CancelOutcome::Cancelled { order, refund })
    }

    /// Cancel a subset of lines, all-or-nothing. The order becomes `CANCELLED`
    /// when no lines remain.
    pub fn cancel_items(
        &self,
        order_id: &OrderId,
        class_ids: &[ClassId],
    ) -> EngineResult<PartialCancellation> {
        let order = self.get(order_id)?;

        let now = self.clock.now();
        let assessments = if order.status().accepts_cancellation() {
            let targeted: Vec<OrderLineItem> = order
                .line_items()
                .iter()
                .filter(|line| class_ids.contains(&line.class_id))
                .cloned()
                .collect();
            self.assess(&order, &targeted, now)?
        } else {
            Vec::new()
        };

        let events = order
            .handle(&OrderCommand::CancelItems(CancelItems {
                order_id: order_id.clone(),
                class_ids: class_ids.to_vec(),
                assessments,
                occurred_at: now,
            }))
            .map_err(|e| refused(order_id, e))?;

        let cancelled: Vec<OrderLineItem> = events
            .iter()
            .filter_map(|e| match e {
                OrderEvent::ItemsCancelled(c) => Some(c.items.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        let refund: Money = events.iter().filter_map(OrderEvent::refund).sum();

        let order = self.commit(&order, events)?;
        tracing::info!(
            order_id = %order_id,
            cancelled = cancelled.len(),
            remaining = order.line_items().len(),
            refund = %refund,
            status = ?order.status(),
            "order items cancelled"
        );

        Ok(PartialCancellation {
            order,
            cancelled,
            refund,
        })
    }

    /// Per-line cancellability and refunds, as the learner would see them now.
    pub fn cancellation_preview(&self, order_id: &OrderId) -> EngineResult<CancellationPreview> {
        let order = self.get(order_id)?;
        let assessments = self.assess(&order, order.line_items(), self.clock.now())?;
        Ok(preview_cancellation(&order, &assessments)?)
    }

    /// Apply any due automatic transition (settlement, then lock-in).
    ///
    /// Idempotent: an order with nothing due is returned unchanged.
    pub fn advance(&self, order_id: &OrderId) -> EngineResult<Order> {
        self.advance_one(order_id).map(|(order, _)| order)
    }

    /// Scheduler sweep over every order that can still transition.
    pub fn advance_all(&self) -> EngineResult<AdvanceReport> {
        let mut due: Vec<OrderId> = self
            .orders
            .list()?
            .into_iter()
            .filter(|(_, doc)| {
                matches!(
                    doc.value.status,
                    OrderStatus::Processing | OrderStatus::Completed
                )
            })
            .map(|(id, _)| id)
            .collect();
        due.sort();

        let mut report = AdvanceReport::default();
        for order_id in due {
            match self.advance_one(&order_id) {
                Ok((_, true)) => report.advanced.push(order_id),
                Ok((_, false)) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "automatic transition failed");
                    report.failed.push((order_id, e));
                }
            }
        }

        tracing::debug!(
            advanced = report.advanced.len(),
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "order sweep finished"
        );
        Ok(report)
    }

    /// Settlement and lock-in commit separately. A lock-in failure is
    /// returned, but a settlement that was due stays committed.
    fn advance_one(&self, order_id: &OrderId) -> EngineResult<(Order, bool)> {
        let (settled, did_settle) =
            retry::on_conflict("order.settle", self.config.max_conflict_retries, || {
                let order = self.get(order_id)?;
                let now = self.clock.now();
                let advanced = lifecycle::settle(&order, now, self.config.settlement_delay)?;
                self.commit_advanced(order, advanced)
            })?;

        if settled.status() != OrderStatus::Completed {
            return Ok((settled, did_settle));
        }

        let (locked, did_lock) =
            retry::on_conflict("order.lock_in", self.config.max_conflict_retries, || {
                let order = self.get(order_id)?;
                let now = self.clock.now();
                let advanced = lifecycle::lock_in(&order, now, |o| {
                    self.assess(o, o.line_items(), now)
                })?;
                self.commit_advanced(order, advanced)
            })?;
        Ok((locked, did_settle || did_lock))
    }

    fn commit_advanced(&self, order: Order, advanced: Advanced) -> EngineResult<(Order, bool)> {
        if !advanced.changed() {
            tracing::debug!(order_id = %order.id(), status = ?order.status(), "no transition due");
            return Ok((order, false));
        }

        let from = order.status();
        let next = self.commit_applied(&order, advanced.order, advanced.events)?;
        tracing::info!(order_id = %next.id(), from = ?from, to = ?next.status(), "order advanced");
        Ok((next, true))
    }

    fn assess(
        &self,
        order: &Order,
        lines: &[OrderLineItem],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<ItemAssessment>> {
        lines
            .iter()
            .map(|line| {
                let descriptor = self.catalog.get(&line.class_id)?;
                if descriptor.is_none() {
                    tracing::warn!(
                        order_id = %order.id(),
                        class_id = %line.class_id,
                        "class missing from catalog; treating the line as cancellable"
                    );
                }
                Ok(assess_line(
                    order.id(),
                    &line.class_id,
                    descriptor.as_ref(),
                    &self.practice,
                    now,
                    self.config.local_offset,
                )?)
            })
            .collect()
    }

    fn commit(&self, before: &Order, events: Vec<OrderEvent>) -> EngineResult<Order> {
        let mut after = before.clone();
        for event in &events {
            after.apply(event);
        }
        self.commit_applied(before, after, events)
    }

    fn commit_applied(
        &self,
        before: &Order,
        after: Order,
        events: Vec<OrderEvent>,
    ) -> EngineResult<Order> {
        let expected = if before.is_created() {
            ExpectedVersion::Exact(before.version())
        } else {
            ExpectedVersion::NoDocument
        };

        let record = after.to_record()?;
        self.orders
            .put(after.id().clone(), Versioned::new(record, after.version()), expected)?;

        self.publish(after.id(), before.version(), events);
        Ok(after)
    }

    /// Publication happens after the commit; a failure here does not undo it.
    fn publish(&self, order_id: &OrderId, base_version: u64, events: Vec<OrderEvent>) {
        for (sequence, event) in (base_version + 1..).zip(events) {
            let envelope =
                EventEnvelope::wrap(order_id.as_str(), ORDER_AGGREGATE_TYPE, sequence, event);
            if let Err(e) = self.bus.publish(envelope) {
                tracing::warn!(order_id = %order_id, sequence, error = ?e, "failed to publish order event");
            }
        }
    }
}

fn refused(order_id: &OrderId, err: DomainError) -> EngineError {
    if let DomainError::Ineligible(refusal) = &err {
        tracing::info!(
            order_id = %order_id,
            reason = %refusal.reason,
            class_id = ?refusal.class_id,
            "cancellation refused"
        );
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use classorder_catalog::{
        ClassDescriptor, CollaboratorError, InMemoryClassCatalog, InMemoryPracticeHistory,
    };
    use classorder_core::{BlockReason, FixedClock};
    use classorder_events::InMemoryEventBus;

    use crate::store::InMemoryDocumentStore;

    type TestLedger = OrderLedger<
        Arc<InMemoryDocumentStore<OrderId, OrderRecord>>,
        Arc<InMemoryClassCatalog>,
        Arc<InMemoryPracticeHistory>,
        Arc<InMemoryEventBus<OrderEnvelope>>,
    >;

    struct Fixture {
        ledger: TestLedger,
        store: Arc<InMemoryDocumentStore<OrderId, OrderRecord>>,
        catalog: Arc<InMemoryClassCatalog>,
        practice: Arc<InMemoryPracticeHistory>,
        bus: Arc<InMemoryEventBus<OrderEnvelope>>,
        clock: Arc<FixedClock>,
    }

    fn start() -> DateTime<Utc> {
        // 2026-03-02 10:00 KST
        Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::new());
        let catalog = Arc::new(InMemoryClassCatalog::with_classes([
            ClassDescriptor::scheduled("sched", Money::new(30_000), date(2026, 3, 10)),
            ClassDescriptor::ongoing("ongoing", Money::new(20_000)),
        ]));
        let practice = Arc::new(InMemoryPracticeHistory::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(FixedClock::new(start()));
        let ledger = OrderLedger::new(
            store.clone(),
            catalog.clone(),
            practice.clone(),
            bus.clone(),
            clock.clone(),
            EngineConfig::default(),
        );
        Fixture {
            ledger,
            store,
            catalog,
            practice,
            bus,
            clock,
        }
    }

    fn lines() -> Vec<OrderLineItem> {
        vec![
            OrderLineItem::new(ClassId::from("sched"), 1, Money::new(30_000)),
            OrderLineItem::new(ClassId::from("ongoing"), 2, Money::new(20_000)),
        ]
    }

    fn place(f: &Fixture) -> Order {
        f.ledger
            .place(LearnerId::from("learner-1"), lines(), PaymentMethod::CreditCard)
            .unwrap()
    }

    #[test]
    fn placed_orders_are_persisted_and_published() {
        let f = fixture();
        let sub = f.bus.subscribe();

        let order = place(&f);
        assert_eq!(order.status(), OrderStatus::Processing);
        assert!(order.id().as_str().starts_with("ORD-2026-0302-"));
        assert_eq!(order.total_amount(), Money::new(70_000));

        let stored = f.store.get(order.id()).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(f.ledger.get(order.id()).unwrap(), order);

        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.event_type(), "order.placed");
        assert_eq!(envelope.aggregate_type(), ORDER_AGGREGATE_TYPE);
        assert_eq!(envelope.sequence_number(), 1);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let f = fixture();
        let missing = OrderId::from("ORD-2026-0101-00000000");
        assert_eq!(f.ledger.status(&missing), Err(EngineError::NotFound));
        assert_eq!(f.ledger.cancel_order(&missing), Err(EngineError::NotFound));
    }

    #[test]
    fn full_cancellation_refunds_every_line_and_is_idempotent() {
        let f = fixture();
        let order = place(&f);

        let outcome = f.ledger.cancel_order(order.id()).unwrap();
        assert_eq!(outcome.refund(), Money::new(70_000));
        assert_eq!(outcome.order().status(), OrderStatus::Cancelled);
        assert!(outcome.order().line_items().is_empty());

        let again = f.ledger.cancel_order(order.id()).unwrap();
        assert!(again.is_already_cancelled());
        assert_eq!(again.refund(), Money::ZERO);
        assert_eq!(f.store.get(order.id()).unwrap().unwrap().version, 3);
    }

    #[test]
    fn practice_record_blocks_full_cancellation() {
        let f = fixture();
        let order = place(&f);
        f.practice.record(order.id().clone(), ClassId::from("ongoing"));

        let err = f.ledger.cancel_order(order.id()).unwrap_err();
        assert_eq!(err.block_reason(), Some(BlockReason::LockedByPracticeRecord));
        assert_eq!(f.ledger.status(order.id()).unwrap(), OrderStatus::Processing);
    }

    #[test]
    fn partial_cancellation_keeps_the_rest() {
        let f = fixture();
        let order = place(&f);

        let result = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("ongoing")])
            .unwrap();
        assert_eq!(result.refund, Money::new(40_000));
        assert_eq!(result.cancelled.len(), 1);
        assert_eq!(result.order.status(), OrderStatus::Processing);
        assert_eq!(result.order.total_amount(), Money::new(30_000));
    }

    #[test]
    fn cancelling_the_last_lines_cancels_the_order() {
        let f = fixture();
        let order = place(&f);

        let result = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("sched"), ClassId::from("ongoing")])
            .unwrap();
        assert_eq!(result.order.status(), OrderStatus::Cancelled);

        let err = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("sched")])
            .unwrap_err();
        assert_eq!(err.block_reason(), Some(BlockReason::OrderCancelled));
    }

    #[test]
    fn unknown_class_in_subset_is_a_validation_error() {
        let f = fixture();
        let order = place(&f);
        let err = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("nope")])
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn class_missing_from_catalog_is_cancellable() {
        let f = fixture();
        let order = place(&f);
        f.catalog.remove(&ClassId::from("sched"));
        f.clock.set(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());

        let result = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("sched")])
            .unwrap();
        assert_eq!(result.refund, Money::new(30_000));
    }

    #[test]
    fn catalog_outage_aborts_cancellation_without_writing() {
        let f = fixture();
        let order = place(&f);
        f.catalog.set_available(false);

        let err = f.ledger.cancel_order(order.id()).unwrap_err();
        assert!(matches!(err, EngineError::CatalogUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(f.store.get(order.id()).unwrap().unwrap().version, 1);
    }

    #[test]
    fn advance_settles_then_locks_in() {
        let f = fixture();
        let order = place(&f);

        // Not due yet.
        let same = f.ledger.advance(order.id()).unwrap();
        assert_eq!(same.status(), OrderStatus::Processing);

        f.clock.advance(Duration::seconds(6));
        let settled = f.ledger.advance(order.id()).unwrap();
        assert_eq!(settled.status(), OrderStatus::Completed);

        f.practice.record(order.id().clone(), ClassId::from("ongoing"));
        let confirmed = f.ledger.advance(order.id()).unwrap();
        assert_eq!(confirmed.status(), OrderStatus::Confirmed);

        let err = f
            .ledger
            .cancel_items(order.id(), &[ClassId::from("sched")])
            .unwrap_err();
        assert_eq!(err.block_reason(), Some(BlockReason::OrderConfirmed));
    }

    #[test]
    fn advance_all_reports_each_order() {
        let f = fixture();
        let a = place(&f);
        let b = place(&f);
        f.ledger.cancel_order(b.id()).unwrap();

        f.clock.advance(Duration::seconds(10));
        let report = f.ledger.advance_all().unwrap();
        assert_eq!(report.advanced, vec![a.id().clone()]);
        assert!(report.failed.is_empty());

        let report = f.ledger.advance_all().unwrap();
        assert!(report.advanced.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn advance_all_carries_on_past_failures() {
        let f = fixture();
        let order = place(&f);
        f.clock.advance(Duration::seconds(10));
        f.practice.set_available(false);

        // Settlement commits; only the lock-in assessment fails.
        let report = f.ledger.advance_all().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].1,
            EngineError::CatalogUnavailable(_)
        ));
        assert_eq!(f.ledger.status(order.id()).unwrap(), OrderStatus::Completed);

        f.practice.set_available(true);
        f.practice.record(order.id().clone(), ClassId::from("ongoing"));
        let report = f.ledger.advance_all().unwrap();
        assert_eq!(report.advanced.len(), 1);
        assert_eq!(f.ledger.status(order.id()).unwrap(), OrderStatus::Confirmed);
    }

    #[test]
    fn settlement_does_not_wait_for_practice_history() {
        let f = fixture();
        let order = place(&f);
        let sub = f.bus.subscribe();
        f.clock.advance(Duration::hours(1));
        f.practice.set_available(false);

        let err = f.ledger.advance(order.id()).unwrap_err();
        assert!(matches!(err, EngineError::CatalogUnavailable(_)));
        assert_eq!(f.ledger.status(order.id()).unwrap(), OrderStatus::Completed);
        assert_eq!(f.store.get(order.id()).unwrap().unwrap().version, 2);
        assert_eq!(sub.try_recv().unwrap().event_type(), "order.settled");

        // Once practice history is back, lock-in picks up where it left off.
        f.practice.set_available(true);
        assert_eq!(
            f.ledger.advance(order.id()).unwrap().status(),
            OrderStatus::Completed
        );
        assert_eq!(f.store.get(order.id()).unwrap().unwrap().version, 2);
    }

    #[test]
    fn preview_shows_locked_lines() {
        let f = fixture();
        let order = place(&f);
        f.clock.set(Utc.with_ymd_and_hms(2026, 3, 9, 15, 0, 0).unwrap()); // 03-10 00:00 KST

        let preview = f.ledger.cancellation_preview(order.id()).unwrap();
        assert_eq!(preview.order_block, None);
        assert_eq!(preview.full_refund, None);
        let sched = preview
            .lines
            .iter()
            .find(|l| l.item.class_id == ClassId::from("sched"))
            .unwrap();
        assert!(!sched.cancellable);
        let ongoing = preview
            .lines
            .iter()
            .find(|l| l.item.class_id == ClassId::from("ongoing"))
            .unwrap();
        assert!(ongoing.cancellable);
        assert_eq!(ongoing.refund, Money::new(40_000));
    }

    #[test]
    fn orders_for_lists_newest_first() {
        let f = fixture();
        let first = place(&f);
        f.clock.advance(Duration::minutes(1));
        let second = place(&f);
        f.ledger
            .place(LearnerId::from("someone-else"), lines(), PaymentMethod::BankTransfer)
            .unwrap();

        let history = f.ledger.orders_for(&LearnerId::from("learner-1")).unwrap();
        let ids: Vec<_> = history.iter().map(|o| o.id().clone()).collect();
        assert_eq!(ids, vec![second.id().clone(), first.id().clone()]);
    }

    #[test]
    fn stale_writer_gets_a_conflict() {
        let f = fixture();
        let order = place(&f);

        // Someone else commits between our read and our write.
        let stale = f.ledger.get(order.id()).unwrap();
        f.ledger
            .cancel_items(order.id(), &[ClassId::from("ongoing")])
            .unwrap();

        let events = stale
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order.id().clone(),
                assessments: vec![
                    ItemAssessment::open(ClassId::from("sched"), None),
                    ItemAssessment::open(ClassId::from("ongoing"), None),
                ],
                occurred_at: f.clock.now(),
            }))
            .unwrap();
        let err = f.ledger.commit(&stale, events).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(f.ledger.get(order.id()).unwrap().line_items().len(), 1);
    }

    #[test]
    fn collaborator_errors_map_to_unavailable() {
        let err: EngineError = CollaboratorError::unavailable("timeout").into();
        assert_eq!(err, EngineError::CatalogUnavailable("timeout".into()));
    }
}
