//! Learner participation status ("my class" status).
//!
//! Only `eligible`, `participating` and `completed` are ever stored, and a
//! stored status only moves forward. `ended` is derived on read from the
//! participation period.

pub mod status;

pub use status::{
    CompletionRate, DisplayStatus, MyClassStatuses, StoredStatus, display_status, merge,
};
