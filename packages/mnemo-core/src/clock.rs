//! Clock abstraction for time-dependent logic.
//!
//! Decay and memory creation both need "now" in a form that tests can
//! control. A real clock reads the system time; tests substitute a fixed
//! or stepped clock so elapsed-day math is deterministic.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, injected wherever decay or memory creation
/// needs "now" instead of calling `SystemTime::now()` directly.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> i64 {
        self.now_millis() / 1000
    }
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A clock that returns a caller-controlled value, for deterministic tests
/// of decay/eviction timing across crate boundaries.
#[derive(Debug, Default)]
pub struct FixedClock(std::sync::atomic::AtomicI64);

impl FixedClock {
    #[must_use]
    pub fn new(millis: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(millis))
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.0
            .fetch_add(delta_millis, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_positive() {
        assert!(SystemClock.now_millis() > 0);
    }

    #[test]
    fn now_secs_derives_from_millis() {
        let clock = FixedClock::new(12_345_000);
        assert_eq!(clock.now_secs(), 12_345);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
    }
}
