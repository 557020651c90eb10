//! Engine configuration.
//!
//! Defaults reproduce the behaviour learners see today: settlement after six
//! seconds and calendar dates evaluated in Korea Standard Time.

use chrono::{Duration, FixedOffset, Offset, Utc};

pub const SETTLEMENT_DELAY_ENV: &str = "CLASSORDER_SETTLEMENT_DELAY_SECS";
pub const UTC_OFFSET_ENV: &str = "CLASSORDER_UTC_OFFSET_MINUTES";
pub const MAX_CONFLICT_RETRIES_ENV: &str = "CLASSORDER_MAX_CONFLICT_RETRIES";

const DEFAULT_SETTLEMENT_DELAY_SECS: i64 = 6;
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 9 * 60;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Minimum time between `orderDate` and settlement (`PROCESSING -> COMPLETED`).
    pub settlement_delay: Duration,
    /// Offset used to turn calendar dates (course start, period end) into instants.
    pub local_offset: FixedOffset,
    /// Extra attempts for idempotent writes that lose a compare-and-set race.
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_delay: Duration::seconds(DEFAULT_SETTLEMENT_DELAY_SECS),
            local_offset: default_offset(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the environment. Unset variables use the defaults;
    /// invalid ones log a warning and use the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let settlement_delay = parse_var::<i64>(&lookup, SETTLEMENT_DELAY_ENV)
            .and_then(|secs| {
                if secs < 0 {
                    tracing::warn!(var = SETTLEMENT_DELAY_ENV, secs, "negative settlement delay; using default");
                    None
                } else {
                    Some(Duration::seconds(secs))
                }
            })
            .unwrap_or(defaults.settlement_delay);

        let local_offset = parse_var::<i32>(&lookup, UTC_OFFSET_ENV)
            .and_then(|minutes| {
                let offset = minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt);
                if offset.is_none() {
                    tracing::warn!(var = UTC_OFFSET_ENV, minutes, "UTC offset out of range; using default");
                }
                offset
            })
            .unwrap_or(defaults.local_offset);

        let max_conflict_retries = parse_var::<u32>(&lookup, MAX_CONFLICT_RETRIES_ENV)
            .unwrap_or(defaults.max_conflict_retries);

        Self {
            settlement_delay,
            local_offset,
            max_conflict_retries,
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "invalid value; using default");
            None
        }
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}
