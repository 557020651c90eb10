use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use classorder_core::{
    Aggregate, AggregateRoot, BlockReason, ClassId, DomainError, Ineligibility, LearnerId, Money,
    OrderId, ValueObject,
};
use classorder_events::Event;

use crate::eligibility::ItemAssessment;

/// Order status lifecycle.
///
/// `PROCESSING -> COMPLETED -> CONFIRMED`, with `CANCELLED` reachable from
/// `PROCESSING` or `COMPLETED` only. `CONFIRMED` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Awaiting payment settlement.
    Processing,
    /// Paid; still cancellable.
    Completed,
    /// Locked in: some purchased class has started, so nothing can be cancelled.
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn accepts_cancellation(self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

/// How the learner paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

/// One purchased class, with its price snapshotted at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub class_id: ClassId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ValueObject for OrderLineItem {}

impl OrderLineItem {
    pub fn new(class_id: ClassId, quantity: u32, unit_price: Money) -> Self {
        Self {
            class_id,
            quantity,
            unit_price,
        }
    }

    /// `unit_price * quantity`.
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    learner_id: Option<LearnerId>,
    order_date: DateTime<Utc>,
    line_items: Vec<OrderLineItem>,
    status: OrderStatus,
    payment_method: PaymentMethod,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            learner_id: None,
            order_date: DateTime::<Utc>::UNIX_EPOCH,
            line_items: Vec::new(),
            status: OrderStatus::Processing,
            payment_method: PaymentMethod::CreditCard,
            version: 0,
            created: false,
        }
    }

    pub(crate) fn restore(
        id: OrderId,
        learner_id: LearnerId,
        order_date: DateTime<Utc>,
        line_items: Vec<OrderLineItem>,
        status: OrderStatus,
        payment_method: PaymentMethod,
        version: u64,
    ) -> Self {
        Self {
            id,
            learner_id: Some(learner_id),
            order_date,
            line_items,
            status,
            payment_method,
            version,
            created: true,
        }
    }

    pub fn id_typed(&self) -> &OrderId {
        &self.id
    }

    pub fn learner_id(&self) -> Option<&LearnerId> {
        self.learner_id.as_ref()
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn line_items(&self) -> &[OrderLineItem] {
        &self.line_items
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn line_item(&self, class_id: &ClassId) -> Option<&OrderLineItem> {
        self.line_items.iter().find(|l| &l.class_id == class_id)
    }

    /// Sum of `unit_price * quantity` over the current lines.
    ///
    /// Always derived, never stored. Placement rejects orders whose total
    /// overflows, so the saturating sum here is exact.
    pub fn total_amount(&self) -> Money {
        self.line_items
            .iter()
            .map(|l| l.unit_price.checked_mul(l.quantity).unwrap_or(Money::new(u64::MAX)))
            .sum()
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub learner_id: LearnerId,
    pub order_date: DateTime<Utc>,
    pub line_items: Vec<OrderLineItem>,
    pub payment_method: PaymentMethod,
}

/// Command: Settle (payment confirmed once the settlement delay has elapsed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settle {
    pub order_id: OrderId,
    pub now: DateTime<Utc>,
    pub settlement_delay: Duration,
}

/// Command: LockIn (confirm the whole order once any line is locked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockIn {
    pub order_id: OrderId,
    pub assessments: Vec<ItemAssessment>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (every line, all-or-nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub assessments: Vec<ItemAssessment>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelItems (a non-empty subset of lines, all-or-nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelItems {
    pub order_id: OrderId,
    pub class_ids: Vec<ClassId>,
    pub assessments: Vec<ItemAssessment>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    Settle(Settle),
    LockIn(LockIn),
    CancelOrder(CancelOrder),
    CancelItems(CancelItems),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub learner_id: LearnerId,
    pub order_date: DateTime<Utc>,
    pub line_items: Vec<OrderLineItem>,
    pub payment_method: PaymentMethod,
}

/// Event: OrderSettled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderLockedIn. Names the first locked line that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLockedIn {
    pub order_id: OrderId,
    pub class_id: ClassId,
    pub reason: BlockReason,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsCancelled. `refund` is the sum of the removed lines' totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsCancelled {
    pub order_id: OrderId,
    pub items: Vec<OrderLineItem>,
    pub refund: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled. Always follows the `ItemsCancelled` that emptied the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderSettled(OrderSettled),
    OrderLockedIn(OrderLockedIn),
    ItemsCancelled(ItemsCancelled),
    OrderCancelled(OrderCancelled),
}

impl OrderEvent {
    /// Refund carried by this event, if it is a cancellation of lines.
    pub fn refund(&self) -> Option<Money> {
        match self {
            OrderEvent::ItemsCancelled(e) => Some(e.refund),
            _ => None,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "order.placed",
            OrderEvent::OrderSettled(_) => "order.settled",
            OrderEvent::OrderLockedIn(_) => "order.locked_in",
            OrderEvent::ItemsCancelled(_) => "order.items_cancelled",
            OrderEvent::OrderCancelled(_) => "order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.order_date,
            OrderEvent::OrderSettled(e) => e.occurred_at,
            OrderEvent::OrderLockedIn(e) => e.occurred_at,
            OrderEvent::ItemsCancelled(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id.clone();
                self.learner_id = Some(e.learner_id.clone());
                self.order_date = e.order_date;
                self.line_items = e.line_items.clone();
                self.payment_method = e.payment_method;
                self.status = OrderStatus::Processing;
                self.created = true;
            }
            OrderEvent::OrderSettled(_) => {
                self.status = OrderStatus::Completed;
            }
            OrderEvent::OrderLockedIn(_) => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::ItemsCancelled(e) => {
                self.line_items
                    .retain(|l| !e.items.iter().any(|c| c.class_id == l.class_id));
            }
            OrderEvent::OrderCancelled(_) => {
                self.line_items.clear();
                self.status = OrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::Settle(cmd) => self.handle_settle(cmd),
            OrderCommand::LockIn(cmd) => self.handle_lock_in(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel_order(cmd),
            OrderCommand::CancelItems(cmd) => self.handle_cancel_items(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: &OrderId) -> Result<(), DomainError> {
        if &self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self, order_id: &OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(order_id)
    }

    fn assessment_for<'a>(
        &self,
        assessments: &'a [ItemAssessment],
        class_id: &ClassId,
    ) -> Result<&'a ItemAssessment, DomainError> {
        assessments
            .iter()
            .find(|a| &a.class_id == class_id)
            .ok_or_else(|| {
                DomainError::invariant(format!("missing eligibility assessment for class {class_id}"))
            })
    }

    /// First locked line among `lines`, in order-line order.
    fn first_blocking<'a>(
        &self,
        lines: impl IntoIterator<Item = &'a OrderLineItem>,
        assessments: &[ItemAssessment],
    ) -> Result<Option<Ineligibility>, DomainError> {
        for line in lines {
            let assessment = self.assessment_for(assessments, &line.class_id)?;
            if let Some(refusal) = assessment.ineligibility() {
                return Ok(Some(refusal));
            }
        }
        Ok(None)
    }

    fn cancellation_events(
        &self,
        items: Vec<OrderLineItem>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        let refund = crate::refund::refund_for(&items)?;
        let empties_order = items.len() == self.line_items.len();

        let mut events = vec![OrderEvent::ItemsCancelled(ItemsCancelled {
            order_id: self.id.clone(),
            items,
            refund,
            occurred_at,
        })];
        if empties_order {
            events.push(OrderEvent::OrderCancelled(OrderCancelled {
                order_id: self.id.clone(),
                occurred_at,
            }));
        }
        Ok(events)
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        self.ensure_order_id(&cmd.order_id)?;

        if cmd.line_items.is_empty() {
            return Err(DomainError::validation(
                "order must contain at least one line item",
            ));
        }

        for (idx, line) in cmd.line_items.iter().enumerate() {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity must be positive (class {})",
                    line.class_id
                )));
            }
            if cmd.line_items[..idx].iter().any(|l| l.class_id == line.class_id) {
                return Err(DomainError::validation(format!(
                    "class {} appears more than once",
                    line.class_id
                )));
            }
        }

        crate::refund::refund_for(&cmd.line_items)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id.clone(),
            learner_id: cmd.learner_id.clone(),
            order_date: cmd.order_date,
            line_items: cmd.line_items.clone(),
            payment_method: cmd.payment_method,
        })])
    }

    fn handle_settle(&self, cmd: &Settle) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created(&cmd.order_id)?;

        if self.status != OrderStatus::Processing {
            return Ok(vec![]);
        }
        if cmd.now - self.order_date < cmd.settlement_delay {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::OrderSettled(OrderSettled {
            order_id: self.id.clone(),
            occurred_at: cmd.now,
        })])
    }

    fn handle_lock_in(&self, cmd: &LockIn) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created(&cmd.order_id)?;

        // Lock-in only ever starts from COMPLETED.
        if self.status != OrderStatus::Completed {
            return Ok(vec![]);
        }

        let Some(refusal) = self.first_blocking(&self.line_items, &cmd.assessments)? else {
            return Ok(vec![]);
        };
        let Some(class_id) = refusal.class_id else {
            return Ok(vec![]);
        };

        Ok(vec![OrderEvent::OrderLockedIn(OrderLockedIn {
            order_id: self.id.clone(),
            class_id,
            reason: refusal.reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_order(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created(&cmd.order_id)?;

        match self.status {
            OrderStatus::Cancelled => return Ok(vec![]),
            OrderStatus::Confirmed => {
                return Err(DomainError::ineligible(Ineligibility::order(
                    BlockReason::OrderConfirmed,
                    "enrollment for this order is confirmed; it can no longer be cancelled",
                )));
            }
            OrderStatus::Processing | OrderStatus::Completed => {}
        }

        if let Some(refusal) = self.first_blocking(&self.line_items, &cmd.assessments)? {
            return Err(DomainError::ineligible(refusal));
        }

        self.cancellation_events(self.line_items.clone(), cmd.occurred_at)
    }

    fn handle_cancel_items(&self, cmd: &CancelItems) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created(&cmd.order_id)?;

        match self.status {
            OrderStatus::Cancelled => {
                return Err(DomainError::ineligible(Ineligibility::order(
                    BlockReason::OrderCancelled,
                    "order is already cancelled",
                )));
            }
            OrderStatus::Confirmed => {
                return Err(DomainError::ineligible(Ineligibility::order(
                    BlockReason::OrderConfirmed,
                    "enrollment for this order is confirmed; it can no longer be cancelled",
                )));
            }
            OrderStatus::Processing | OrderStatus::Completed => {}
        }

        if cmd.class_ids.is_empty() {
            return Err(DomainError::validation(
                "select at least one class to cancel",
            ));
        }

        let mut selected: Vec<OrderLineItem> = Vec::with_capacity(cmd.class_ids.len());
        for class_id in &cmd.class_ids {
            if selected.iter().any(|l| &l.class_id == class_id) {
                continue;
            }
            let line = self.line_item(class_id).ok_or_else(|| {
                DomainError::validation(format!("class {class_id} is not part of this order"))
            })?;
            selected.push(line.clone());
        }

        if let Some(refusal) = self.first_blocking(&selected, &cmd.assessments)? {
            return Err(DomainError::ineligible(refusal));
        }

        self.cancellation_events(selected, cmd.occurred_at)
    }
}
