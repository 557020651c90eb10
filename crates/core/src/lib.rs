//! `classorder-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, the domain error model, aggregate traits and the clock
//! abstraction used to keep time-dependent rules deterministic.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock, local_midnight};
pub use error::{BlockReason, DomainError, DomainResult, Ineligibility};
pub use id::{ClassId, LearnerId, OrderId};
pub use money::Money;
pub use value_object::ValueObject;
