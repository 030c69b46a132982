use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Wall-clock timestamp used throughout the kernel.
pub type Timestamp = DateTime<Utc>;

/// Source of wall-clock time. Injected so the kernel can run against simulated time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually advanced clock. Time only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Fixed, readable epoch for tests and replays.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn advance_ms(&self, ms: u64) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += Duration::milliseconds(ms as i64);
    }

    /// Moves the clock forward to `target`. Never moves backwards.
    pub fn advance_to(&self, target: Timestamp) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if target > *now {
            *now = target;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Milliseconds between two timestamps, clamped at zero.
pub fn elapsed_ms(from: Timestamp, to: Timestamp) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();
        clock.advance_ms(1500);
        assert_eq!(elapsed_ms(start, clock.now()), 1500);
    }

    #[test]
    fn test_advance_to_never_rewinds() {
        let clock = ManualClock::at_epoch();
        clock.advance_ms(100);
        clock.advance_to(DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(elapsed_ms(DateTime::<Utc>::UNIX_EPOCH, clock.now()), 100);
    }

    #[test]
    fn test_elapsed_is_clamped() {
        let later = DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(10);
        assert_eq!(elapsed_ms(later, DateTime::<Utc>::UNIX_EPOCH), 0);
    }
}
