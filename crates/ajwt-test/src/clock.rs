//! A clock tests can move.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use ajwt_core::{Clock, SharedClock, Timestamp};

/// Default start time of a [`ManualClock`] (2023-11-14T22:13:20Z).
pub const TEST_EPOCH: i64 = 1_700_000_000;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    /// A clock at `unix_seconds`.
    #[must_use]
    pub fn at(unix_seconds: i64) -> Self {
        Self(AtomicI64::new(unix_seconds))
    }

    /// A shared clock at [`TEST_EPOCH`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::at(TEST_EPOCH))
    }

    /// Move forward (or backward, for negative `secs`).
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to `unix_seconds`.
    pub fn set(&self, unix_seconds: i64) {
        self.0.store(unix_seconds, Ordering::SeqCst);
    }

    /// Coerce to the protocol's clock handle.
    #[must_use]
    pub fn as_shared(self: &Arc<Self>) -> SharedClock {
        Arc::clone(self) as SharedClock
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(TEST_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let secs = self.0.load(Ordering::SeqCst);
        Timestamp::from_unix_seconds(secs).unwrap_or_else(Timestamp::now)
    }
}
