//! Time abstraction for testability.
//!
//! Log entries are stamped and aged through a [`Clock`] so tests can pin
//! "now" instead of relying on the system time.

use std::time::SystemTime;

/// Abstraction over system time for testability.
///
/// # Example
///
/// ```
/// use formhook::time::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.unix_seconds() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;

    /// Returns the current time as seconds since the Unix epoch.
    ///
    /// Pre-epoch clocks report 0.
    fn unix_seconds(&self) -> u64 {
        self.now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Production clock using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Controllable clock for tests.
#[cfg(test)]
pub mod mock {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, SystemTime};

    /// A clock that returns controlled time values.
    #[derive(Debug)]
    pub struct MockClock {
        /// Seconds since `UNIX_EPOCH`, atomically updated.
        secs: AtomicU64,
    }

    impl MockClock {
        /// Creates a clock frozen at `initial_secs` after the epoch.
        #[must_use]
        pub const fn new(initial_secs: u64) -> Self {
            Self {
                secs: AtomicU64::new(initial_secs),
            }
        }

        /// Moves the clock forward.
        pub fn advance(&self, secs: u64) {
            self.secs.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + Duration::from_secs(self.secs.load(Ordering::SeqCst))
        }
    }

    impl Clock for std::sync::Arc<MockClock> {
        fn now(&self) -> SystemTime {
            (**self).now()
        }
    }
}
