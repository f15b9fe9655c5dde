//! Clock abstraction for testable timeout handling.
//!
//! All timestamps in the fleet are Unix epoch seconds (instance launch
//! times come from the cloud provider in that form). The reaper compares
//! `created_at + timeout` against `Clock::epoch_secs()`, so tests inject
//! a `FakeClock` and advance it instead of sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time as Unix epoch seconds.
pub trait Clock: Clone + Send + Sync {
    fn epoch_secs(&self) -> u64;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    epoch: Arc<Mutex<u64>>,
}

impl FakeClock {
    /// Start the clock at the given epoch second.
    pub fn at(epoch_secs: u64) -> Self {
        Self {
            epoch: Arc::new(Mutex::new(epoch_secs)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        *epoch += duration.as_secs();
    }

    /// Jump the clock to a specific epoch second.
    pub fn set(&self, epoch_secs: u64) {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        *epoch = epoch_secs;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::at(1_000_000)
    }
}

impl Clock for FakeClock {
    fn epoch_secs(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2024() {
        let now = SystemClock.epoch_secs();
        assert!(now > 1_704_067_200);
    }

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::at(1000);
        assert_eq!(clock.epoch_secs(), 1000);

        clock.advance(Duration::from_secs(600));
        assert_eq!(clock.epoch_secs(), 1600);

        clock.set(42);
        assert_eq!(clock.epoch_secs(), 42);
    }

    #[test]
    fn fake_clock_clones_share_time() {
        let clock = FakeClock::at(1000);
        let other = clock.clone();
        clock.advance(Duration::from_secs(10));
        assert_eq!(other.epoch_secs(), 1010);
    }
}
