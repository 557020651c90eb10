//! Automatic order transitions (settlement and lock-in) as a pure function.
//!
//! `advance` is what an external scheduler calls, whatever drives it (a timer,
//! cron, an event trigger). Calling it again on an order that already
//! satisfies both conditions does nothing.

use chrono::{DateTime, Duration, Utc};

use classorder_core::{Aggregate, AggregateRoot, DomainError};

use crate::eligibility::ItemAssessment;
use crate::order::{LockIn, Order, OrderCommand, OrderEvent, OrderStatus, Settle};

/// Result of advancing an order: the next state and the events that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advanced {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

impl Advanced {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Settlement step alone. Depends only on `order_date` and the delay, so it
/// never needs a collaborator.
pub fn settle(
    order: &Order,
    now: DateTime<Utc>,
    settlement_delay: Duration,
) -> Result<Advanced, DomainError> {
    let mut next = order.clone();
    let events = next.handle(&OrderCommand::Settle(Settle {
        order_id: next.id().clone(),
        now,
        settlement_delay,
    }))?;
    for e in &events {
        next.apply(e);
    }
    Ok(Advanced {
        order: next,
        events,
    })
}

/// Lock-in step alone. `assess` is only called for a `COMPLETED` order.
pub fn lock_in<E, F>(order: &Order, now: DateTime<Utc>, mut assess: F) -> Result<Advanced, E>
where
    E: From<DomainError>,
    F: FnMut(&Order) -> Result<Vec<ItemAssessment>, E>,
{
    let mut next = order.clone();
    if next.status() != OrderStatus::Completed {
        return Ok(Advanced {
            order: next,
            events: Vec::new(),
        });
    }

    let assessments = assess(&next)?;
    let events = next.handle(&OrderCommand::LockIn(LockIn {
        order_id: next.id().clone(),
        assessments,
        occurred_at: now,
    }))?;
    for e in &events {
        next.apply(e);
    }
    Ok(Advanced {
        order: next,
        events,
    })
}

/// Apply settlement, then lock-in, to a copy of `order`.
///
/// `assess` is only called when the order is `COMPLETED` after settlement, so
/// orders that cannot lock in never touch the catalog or practice history.
/// Callers that persist should commit [`settle`] on its own first, so a
/// collaborator outage cannot hold back a due settlement.
pub fn advance<E, F>(
    order: &Order,
    now: DateTime<Utc>,
    settlement_delay: Duration,
    assess: F,
) -> Result<Advanced, E>
where
    E: From<DomainError>,
    F: FnMut(&Order) -> Result<Vec<ItemAssessment>, E>,
{
    let settled = settle(order, now, settlement_delay)?;
    let mut locked = lock_in(&settled.order, now, assess)?;

    let mut events = settled.events;
    events.append(&mut locked.events);
    Ok(Advanced {
        order: locked.order,
        events,
    })
}
