//! Class orders domain module.
//!
//! This crate contains the order state machine and the cancellation/refund
//! rules, implemented as deterministic domain logic (no IO, no storage).
//! Anything that depends on an external collaborator (catalog, practice
//! history) or on time is resolved by the caller into [`ItemAssessment`]s and
//! passed in on the command.

pub mod eligibility;
pub mod lifecycle;
pub mod order;
pub mod record;
pub mod refund;

pub use eligibility::{ItemAssessment, ItemLock, assess_line, is_locked_by_start_date};
pub use lifecycle::{Advanced, advance, lock_in, settle};
pub use order::{
    CancelItems, CancelOrder, ItemsCancelled, LockIn, Order, OrderCancelled, OrderCommand,
    OrderEvent, OrderLineItem, OrderLockedIn, OrderPlaced, OrderSettled, OrderStatus,
    PaymentMethod, PlaceOrder, Settle,
};
pub use record::OrderRecord;
pub use refund::{CancellationPreview, LinePreview, preview_cancellation, refund_for};
