//! Refund computation and the pre-cancellation preview.
//!
//! Refunds always use the unit price snapshotted on the order line, never a
//! fresh catalog price, and always cover whole lines.

use serde::{Deserialize, Serialize};

use classorder_core::{BlockReason, DomainError, DomainResult, Money, OrderId};

use crate::eligibility::ItemAssessment;
use crate::order::{Order, OrderLineItem, OrderStatus};

/// `Σ unit_price × quantity` over the given lines.
pub fn refund_for(items: &[OrderLineItem]) -> DomainResult<Money> {
    let totals = items
        .iter()
        .map(OrderLineItem::line_total)
        .collect::<DomainResult<Vec<_>>>()?;
    Money::try_sum(totals)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePreview {
    pub item: OrderLineItem,
    pub assessment: ItemAssessment,
    /// Whether this line could be cancelled on its own right now.
    pub cancellable: bool,
    pub refund: Money,
}

/// What a learner would get back, line by line, if they cancelled now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationPreview {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Order-level refusal that applies to every line.
    pub order_block: Option<BlockReason>,
    pub lines: Vec<LinePreview>,
    /// Refund for a full cancellation, when every line is cancellable.
    pub full_refund: Option<Money>,
}

pub fn preview_cancellation(
    order: &Order,
    assessments: &[ItemAssessment],
) -> DomainResult<CancellationPreview> {
    let order_block = match order.status() {
        OrderStatus::Confirmed => Some(BlockReason::OrderConfirmed),
        OrderStatus::Cancelled => Some(BlockReason::OrderCancelled),
        OrderStatus::Processing | OrderStatus::Completed => None,
    };

    let mut lines = Vec::with_capacity(order.line_items().len());
    for item in order.line_items() {
        let assessment = assessments
            .iter()
            .find(|a| a.class_id == item.class_id)
            .cloned()
            .ok_or_else(|| {
                DomainError::invariant(format!(
                    "missing eligibility assessment for class {}",
                    item.class_id
                ))
            })?;
        lines.push(LinePreview {
            item: item.clone(),
            cancellable: order_block.is_none() && !assessment.is_locked(),
            assessment,
            refund: item.line_total()?,
        });
    }

    let full_refund = if !lines.is_empty() && lines.iter().all(|l| l.cancellable) {
        Some(refund_for(order.line_items())?)
    } else {
        None
    };

    Ok(CancellationPreview {
        order_id: order.id_typed().clone(),
        status: order.status(),
        order_block,
        lines,
        full_refund,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::ItemLock;
    use crate::order::{OrderCommand, PaymentMethod, PlaceOrder};
    use chrono::Utc;
    use classorder_catalog::EnrollmentType;
    use classorder_core::{Aggregate, ClassId, LearnerId};

    fn order_with(lines: Vec<OrderLineItem>) -> Order {
        let id = OrderId::from("ORD-T");
        let mut order = Order::empty(id.clone());
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id: id,
                learner_id: LearnerId::from("l"),
                order_date: Utc::now(),
                line_items: lines,
                payment_method: PaymentMethod::CreditCard,
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
        order
    }

    #[test]
    fn refund_multiplies_snapshotted_price_by_quantity() {
        let items = vec![
            OrderLineItem::new(ClassId::from("a"), 3, Money::new(12_000)),
            OrderLineItem::new(ClassId::from("b"), 1, Money::new(9_900)),
        ];
        assert_eq!(refund_for(&items).unwrap(), Money::new(45_900));
        assert_eq!(refund_for(&[]).unwrap(), Money::ZERO);
    }

    #[test]
    fn preview_marks_locked_lines() {
        let order = order_with(vec![
            OrderLineItem::new(ClassId::from("a"), 1, Money::new(10_000)),
            OrderLineItem::new(ClassId::from("b"), 2, Money::new(5_000)),
        ]);
        let assessments = vec![
            ItemAssessment {
                class_id: ClassId::from("a"),
                enrollment_type: Some(EnrollmentType::Ongoing),
                lock: ItemLock::LockedByPracticeRecord,
            },
            ItemAssessment::open(ClassId::from("b"), Some(EnrollmentType::Scheduled)),
        ];

        let preview = preview_cancellation(&order, &assessments).unwrap();
        assert_eq!(preview.order_block, None);
        assert!(!preview.lines[0].cancellable);
        assert!(preview.lines[1].cancellable);
        assert_eq!(preview.lines[1].refund, Money::new(10_000));
        assert_eq!(preview.full_refund, None);
    }

    #[test]
    fn preview_offers_full_refund_when_everything_is_open() {
        let order = order_with(vec![OrderLineItem::new(ClassId::from("a"), 2, Money::new(7_000))]);
        let preview =
            preview_cancellation(&order, &[ItemAssessment::open(ClassId::from("a"), None)]).unwrap();
        assert_eq!(preview.full_refund, Some(Money::new(14_000)));
    }
}
