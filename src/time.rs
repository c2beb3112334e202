//! Monotonic time primitives.
//!
//! Grounded in the teacher crate's `runtime::timer` module, but backed by
//! `std::time::Instant` instead of a `no_std` offset-from-boot `Duration`:
//! this substrate requires real OS threads and condition variables, so it
//! is a `std`-only crate and can use `Instant` directly.

use std::time::{Duration, Instant};

/// A point in time read from a monotonic clock.
///
/// # Contract
/// - All `MonotonicTimePoint` values compared against each other must come
///   from the same process; they are not meaningful across machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimePoint(Instant);

impl MonotonicTimePoint {
    /// The current instant.
    pub fn now() -> Self {
        MonotonicTimePoint(Instant::now())
    }

    /// Build a time point this many ticks in the future of `self`,
    /// saturating rather than overflowing.
    pub fn saturating_add(&self, delta: Duration) -> Self {
        MonotonicTimePoint(self.0 + delta)
    }

    /// The saturating difference `self - earlier`, zero if `earlier` is in
    /// the future relative to `self`.
    pub fn saturating_duration_since(&self, earlier: MonotonicTimePoint) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }

    /// The underlying `Instant`, for interop with `std::sync::Condvar`'s
    /// timed-wait APIs.
    pub fn as_instant(&self) -> Instant {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_add_moves_forward() {
        let now = MonotonicTimePoint::now();
        let later = now.saturating_add(Duration::from_millis(10));
        assert!(later >= now);
    }

    #[test]
    fn saturating_duration_since_never_underflows() {
        let now = MonotonicTimePoint::now();
        let later = now.saturating_add(Duration::from_millis(10));
        assert_eq!(now.saturating_duration_since(later), Duration::ZERO);
    }
}
