//! Time sources.
//!
//! The store reads the current time through a [`Clock`] so entry expiration
//! can be driven deterministically in tests with `ManualClock` (behind the
//! `test-helpers` feature).

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use super::Clock;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// A clock that only moves when told to.
    ///
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Creates a clock frozen at `now`.
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        /// Creates a clock frozen at the current wall time.
        pub fn starting_now() -> Self {
            Self::new(Utc::now())
        }

        /// Moves the clock to `now`.
        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now = TimeDelta::from_std(by)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
