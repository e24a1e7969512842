//! Time normalization
//!
//! Remote sources hand back three shapes of time value: instants with an
//! explicit zone or offset, floating local instants, and bare dates
//! marking all-day events. The cache stores a single canonical form: UTC
//! wall-clock with no zone annotation, so that range comparisons are
//! uniform.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A time value as supplied by the remote source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTimestamp {
    /// Instant with an explicit zone or offset
    Zoned(DateTime<FixedOffset>),
    /// Zone-less instant, passed through unchanged
    Floating(NaiveDateTime),
    /// Calendar date with no time of day (all-day marker)
    Date(NaiveDate),
}

impl RemoteTimestamp {
    /// Convert to the canonical storage form
    ///
    /// Zoned instants are converted to UTC and stripped of their offset;
    /// floating instants pass through; bare dates expand to midnight.
    pub fn normalize(self) -> NaiveDateTime {
        match self {
            RemoteTimestamp::Zoned(dt) => dt.with_timezone(&Utc).naive_utc(),
            RemoteTimestamp::Floating(dt) => dt,
            RemoteTimestamp::Date(d) => d.and_time(NaiveTime::MIN),
        }
    }
}
