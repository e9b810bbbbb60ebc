//! Wall-clock source
//!
//! Interval identity is always derived from the wall clock at the moment of
//! use. Components take a `Clock` so tests can drive time by hand.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of Unix wall-clock time.
pub trait Clock: Send + Sync {
    /// Unix time in milliseconds.
    fn now_millis(&self) -> i64;

    /// Unix time in whole seconds (floored).
    fn now_seconds(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn at_seconds(seconds: i64) -> Self {
        Self::at_millis(seconds * 1000)
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn set_seconds(&self, seconds: i64) {
        self.set_millis(seconds * 1000);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at_seconds(10);
        assert_eq!(clock.now_seconds(), 10);

        clock.advance_millis(1_999);
        assert_eq!(clock.now_millis(), 11_999);
        assert_eq!(clock.now_seconds(), 11);

        clock.set_seconds(20);
        assert_eq!(clock.now_seconds(), 20);
    }

    #[test]
    fn test_system_clock_is_after_2024() {
        assert!(SystemClock.now_seconds() > 1_704_067_200);
    }
}
