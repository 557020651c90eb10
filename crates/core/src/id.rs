//! Strongly-typed identifiers used across the domain.
//!
//! Class, learner and order ids are opaque strings owned by other systems (the
//! catalog, the account service, the order numbering scheme), so they wrap a
//! `String` rather than a UUID.

use core::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a class in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

/// Identifier of a learner (the purchasing account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(String);

/// Identifier of an order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse a non-blank identifier.
            pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, " must not be blank")));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(ClassId, "ClassId");
impl_string_newtype!(LearnerId, "LearnerId");
impl_string_newtype!(OrderId, "OrderId");

impl OrderId {
    /// Allocate a new order number: `ORD-YYYY-MMDD-XXXXXXXX`.
    ///
    /// The date part uses the local calendar date; the suffix comes from the
    /// random tail of a UUIDv7.
    pub fn generate(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = now.with_timezone(&offset);
        let bytes = Uuid::now_v7().into_bytes();
        let suffix: String = bytes[12..16].iter().map(|b| format!("{b:02X}")).collect();
        Self(format!("ORD-{}-{}", local.format("%Y-%m%d"), suffix))
    }
}
