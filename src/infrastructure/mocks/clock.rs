//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock whose time only moves when a test moves it.
///
/// Clones share the same time, so a test can keep one handle while the
/// engine holds another.
///
/// # Examples
///
/// ```
/// use safetynet::infrastructure::mocks::MockClock;
/// use safetynet::application::ports::Clock;
/// use chrono::{TimeDelta, Utc};
/// use std::time::Duration;
///
/// let start = Utc::now();
/// let clock = MockClock::new(start);
/// assert_eq!(clock.now(), start);
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + TimeDelta::seconds(10));
///
/// clock.set(start);
/// assert_eq!(clock.now(), start);
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    ///
    /// # Panics
    /// If `duration` does not fit in a `chrono::TimeDelta`.
    pub fn advance(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).expect("MockClock advance out of range");
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += delta;
    }

    /// Move the clock backward.
    pub fn rewind(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).expect("MockClock rewind out of range");
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time -= delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time = at;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}
