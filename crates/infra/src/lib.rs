//! Infrastructure layer: versioned document storage, configuration and the
//! services that run the order and enrollment domain against it.

pub mod cart_store;
pub mod checkout;
pub mod config;
pub mod enrollment_tracker;
pub mod error;
pub mod ledger;
pub mod store;

mod retry;

pub use cart_store::CartStore;
pub use checkout::{CheckoutCoordinator, Quote};
pub use config::EngineConfig;
pub use enrollment_tracker::EnrollmentStatusTracker;
pub use error::{EngineError, EngineResult};
pub use ledger::{
    AdvanceReport, CancelOutcome, ORDER_AGGREGATE_TYPE, OrderEnvelope, OrderLedger,
    PartialCancellation,
};
pub use store::{DocumentStore, InMemoryDocumentStore, StoreError, Versioned};
