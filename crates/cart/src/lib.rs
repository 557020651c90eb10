//! Shopping cart for class purchases.
//!
//! A cart holds one entry per class. It has no gating logic: quantities are
//! clamped rather than rejected, and checkout validation happens elsewhere.

pub mod cart;

pub use cart::{Cart, CartEntry, MAX_QUANTITY, MIN_QUANTITY, clamp_quantity};
