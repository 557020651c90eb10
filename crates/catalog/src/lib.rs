//! Read-only collaborators consumed by the enrollment engine.
//!
//! The class catalog and the practice history are owned by other systems. This
//! crate defines the contracts the engine relies on, plus in-memory fakes for
//! tests and local runs.

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod practice;

pub use catalog::{ClassCatalog, InMemoryClassCatalog};
pub use descriptor::{ClassDescriptor, CompletionRequirements, EnrollmentType};
pub use error::CollaboratorError;
pub use practice::{InMemoryPracticeHistory, PracticeHistory};
