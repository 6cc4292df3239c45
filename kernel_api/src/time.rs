//! Time abstractions

use core::ops::Add;
use serde::{Deserialize, Serialize};

/// A point in time on the kernel's monotonic clock
///
/// In simulated kernels, time is virtual and only moves when a wait times
/// out or a test advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant {
    /// Nanoseconds since boot
    nanos: u64,
}

impl Instant {
    /// Creates an instant from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Returns nanoseconds since boot
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the duration since another instant
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Self::Output {
        Instant::from_nanos(self.nanos.saturating_add(duration.as_nanos()))
    }
}

/// A span of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }
}

/// Absolute deadline for a blocking wait
///
/// `Infinite` blocks until the wait is satisfied or the handle dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deadline {
    Infinite,
    At(Instant),
}

impl Deadline {
    /// Deadline `timeout` after `now`
    pub fn after(now: Instant, timeout: Duration) -> Self {
        Deadline::At(now + timeout)
    }

    /// Whether the deadline is already behind `now`
    pub fn has_passed(&self, now: Instant) -> bool {
        match self {
            Deadline::Infinite => false,
            Deadline::At(at) => *at <= now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion() {
        let d = Duration::from_secs(1);
        assert_eq!(d.as_millis(), 1000);
        assert_eq!(d.as_nanos(), 1_000_000_000);
        assert_eq!(Duration::from_millis(1000), d);
    }

    #[test]
    fn test_instant_duration_since() {
        let i1 = Instant::from_nanos(1000);
        let i2 = Instant::from_nanos(2000);
        assert_eq!(i2.duration_since(i1), Duration::from_nanos(1000));
        assert_eq!(i1.duration_since(i2), Duration::from_nanos(0));
    }

    #[test]
    fn test_instant_add_saturates() {
        let i = Instant::from_nanos(u64::MAX - 1);
        assert_eq!(i + Duration::from_nanos(10), Instant::from_nanos(u64::MAX));
    }

    #[test]
    fn test_infinite_deadline_never_passes() {
        assert!(!Deadline::Infinite.has_passed(Instant::from_nanos(u64::MAX)));
    }

    #[test]
    fn test_finite_deadline() {
        let now = Instant::from_nanos(100);
        let deadline = Deadline::after(now, Duration::from_nanos(50));
        assert!(!deadline.has_passed(now));
        assert!(deadline.has_passed(Instant::from_nanos(150)));
    }
}
