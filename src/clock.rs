//! Time source for view timestamps and store expiry.
//!
//! Production code reads the system clock; tests drive a `ManualClock` so
//! that "25 hours later" is a method call instead of a sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a clone handed to the
/// engine and one kept by the test stay in lockstep.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_ms: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Advance by `duration`. Negative durations are ignored; time only
    /// moves forward.
    pub fn advance(&self, duration: Duration) {
        let delta = duration.num_milliseconds().max(0);
        self.current_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.current_ms
            .fetch_max(time.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(DateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.current_ms.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
    }
}
