//! Lifecycle events and their distribution.
//!
//! Domain crates describe what happened as typed [`Event`]s; services wrap
//! committed events in an [`EventEnvelope`] and publish them on an
//! [`EventBus`] for downstream consumers (notifications, audit, reporting).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
