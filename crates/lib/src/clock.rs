//! Time provider abstraction
//!
//! This module provides a [`Clock`] trait that abstracts over time sources,
//! allowing production code to use real system time while tests use
//! controllable mock time. Presence staleness and heartbeat stamping both
//! read time exclusively through this trait.

use std::fmt::Debug;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// A time provider for getting current timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as a UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock using real system time.
///
/// This is the default clock implementation and simply calls through to
/// [`chrono::Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for tests.
///
/// The clock stays frozen at its current value until advanced or set
/// explicitly, so tests get stable, deterministic timestamps.
///
/// # Example
///
/// ```
/// use basket::{Clock, FixedClock};
/// use chrono::Duration;
///
/// let clock = FixedClock::default();
/// let t1 = clock.now();
/// clock.advance(Duration::minutes(6));
/// assert_eq!(clock.now() - t1, Duration::minutes(6));
/// ```
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a fixed clock starting at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(DateTime::from_timestamp(1_704_067_200, 0).expect("valid timestamp"))
    }
}

impl Debug for FixedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedClock")
            .field("now", &*self.now.lock().unwrap())
            .finish()
    }
}

impl Clone for FixedClock {
    fn clone(&self) -> Self {
        Self::new(*self.now.lock().unwrap())
    }
}
