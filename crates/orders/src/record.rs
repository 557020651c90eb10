//! Persisted order schema.
//!
//! ```json
//! { "orderId": "...", "orderDate": "2026-01-15T10:30:00Z", "learnerId": "...",
//!   "lineItems": [{ "classId": "...", "quantity": 1, "unitPrice": 39000 }],
//!   "status": "PROCESSING", "paymentMethod": "credit_card" }
//! ```
//!
//! There is no `totalAmount` field; it is derived from the lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classorder_core::{AggregateRoot, DomainError, DomainResult, LearnerId, OrderId};

use crate::order::{Order, OrderLineItem, OrderStatus, PaymentMethod};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    pub learner_id: LearnerId,
    pub line_items: Vec<OrderLineItem>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
}

impl Order {
    pub fn to_record(&self) -> DomainResult<OrderRecord> {
        let learner_id = self.learner_id().cloned().ok_or_else(DomainError::not_found)?;
        Ok(OrderRecord {
            order_id: self.id().clone(),
            order_date: self.order_date(),
            learner_id,
            line_items: self.line_items().to_vec(),
            status: self.status(),
            payment_method: self.payment_method(),
        })
    }

    /// Rehydrate from storage at the stored document `version`.
    ///
    /// Rejects records that break the cancelled-iff-empty invariant rather than
    /// loading a corrupt aggregate.
    pub fn from_record(record: OrderRecord, version: u64) -> DomainResult<Order> {
        let cancelled = record.status == OrderStatus::Cancelled;
        if cancelled != record.line_items.is_empty() {
            return Err(DomainError::invariant(format!(
                "order {} has status {:?} with {} line items",
                record.order_id,
                record.status,
                record.line_items.len()
            )));
        }
        if record.line_items.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::invariant(format!(
                "order {} has a line with zero quantity",
                record.order_id
            )));
        }

        Ok(Order::restore(
            record.order_id,
            record.learner_id,
            record.order_date,
            record.line_items,
            record.status,
            record.payment_method,
            version,
        ))
    }
}
