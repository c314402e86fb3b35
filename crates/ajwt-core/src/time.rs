//! Timestamps and injectable clocks.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A UTC instant with whole-second precision.
///
/// Protocol timestamps are carried as unix seconds inside signed data, so
/// sub-second precision is dropped on construction to keep conversions
/// lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "chrono::serde::ts_seconds")] DateTime<Utc>);

impl Timestamp {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Create from a `DateTime<Utc>`, truncating sub-second precision.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_unix_seconds(dt.timestamp()).unwrap_or(Self(dt))
    }

    /// Create from unix seconds. Returns `None` when out of range.
    #[must_use]
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Seconds since the unix epoch.
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted by `secs` (negative shifts backwards).
    ///
    /// Saturates at the representable range.
    #[must_use]
    pub fn plus_secs(&self, secs: i64) -> Self {
        let target = self.unix_seconds().saturating_add(secs);
        Self::from_unix_seconds(target).unwrap_or(*self)
    }

    /// Signed number of seconds from `earlier` to `self`.
    #[must_use]
    pub fn seconds_since(&self, earlier: &Self) -> i64 {
        self.unix_seconds().saturating_sub(earlier.unix_seconds())
    }

    /// The inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

/// A source of the current time.
///
/// Expiry, skew, and nonce-lifetime checks read time through this trait so
/// tests can drive them deterministically.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// The default shared clock.
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
