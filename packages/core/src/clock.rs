//! Monotonic time source for TTL and eviction decisions.
//!
//! All expiration math in this crate goes through [`MonoTime`]/[`MonoClock`].
//! Wall-clock time is only ever derived from a monotonic instant for
//! reporting purposes -- it is never consulted to decide whether something
//! has expired, since wall clocks can jump backwards or forwards.

use std::ops::Add;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A single point in monotonic time.
///
/// Wraps [`std::time::Instant`]. Comparable and addable with [`Duration`],
/// never comparable across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonoTime(Instant);

impl MonoTime {
    /// Wraps a raw `Instant`. Exposed for clock implementations and tests.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        Self(instant)
    }

    /// Returns the wrapped `Instant`.
    #[must_use]
    pub fn as_instant(self) -> Instant {
        self.0
    }

    /// Converts to a Unix-epoch millisecond timestamp for reporting only.
    ///
    /// Computed as `anchor.wall_at_anchor + (self - anchor.mono_at_anchor)`,
    /// so it never itself queries the wall clock.
    #[must_use]
    pub fn to_unix_millis(self, anchor: &ClockAnchor) -> i64 {
        if self.0 >= anchor.mono_at_anchor {
            let elapsed = self.0.duration_since(anchor.mono_at_anchor);
            anchor.wall_millis_at_anchor.saturating_add(truncate_millis(elapsed))
        } else {
            let elapsed = anchor.mono_at_anchor.duration_since(self.0);
            anchor.wall_millis_at_anchor.saturating_sub(truncate_millis(elapsed))
        }
    }
}

fn truncate_millis(d: Duration) -> i64 {
    // Durations this crate deals with (TTLs, process uptime) never approach
    // i64::MAX milliseconds (~292 million years), so truncation is safe.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let millis = d.as_millis() as i64;
    millis
}

impl Add<Duration> for MonoTime {
    type Output = MonoTime;

    fn add(self, rhs: Duration) -> MonoTime {
        MonoTime(self.0 + rhs)
    }
}

/// Fixes the correspondence between a monotonic instant and wall-clock time.
///
/// Captured once (typically at engine construction) so that [`MonoTime::to_unix_millis`]
/// never has to call `SystemTime::now()` itself -- reporting stays a pure
/// function of the anchor and the stored instant.
#[derive(Debug, Clone, Copy)]
pub struct ClockAnchor {
    mono_at_anchor: Instant,
    wall_millis_at_anchor: i64,
}

impl ClockAnchor {
    /// Captures the current monotonic instant and wall-clock time together.
    #[must_use]
    pub fn capture_now() -> Self {
        let wall_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| truncate_millis(d))
            .unwrap_or(0);
        Self {
            mono_at_anchor: Instant::now(),
            wall_millis_at_anchor: wall_millis,
        }
    }
}

/// Abstraction over the monotonic time source, for dependency injection in tests.
pub trait ClockSource: Send + Sync {
    /// Returns the current monotonic instant.
    fn now(&self) -> MonoTime;
}

/// Default clock source backed by the real steady clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMonoClock;

impl ClockSource for SystemMonoClock {
    fn now(&self) -> MonoTime {
        MonoTime(Instant::now())
    }
}

/// A virtual clock for deterministic tests: time only advances when told to.
#[derive(Debug)]
pub struct VirtualClock {
    inner: parking_lot::Mutex<MonoTime>,
}

impl VirtualClock {
    /// Creates a virtual clock anchored at the real "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: parking_lot::Mutex::new(MonoTime(Instant::now())),
        }
    }

    /// Advances the virtual clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        *guard = *guard + duration;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for VirtualClock {
    fn now(&self) -> MonoTime {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_time_ordering_and_addition() {
        let t0 = MonoTime(Instant::now());
        let t1 = t0 + Duration::from_millis(10);
        assert!(t1 > t0);
    }

    #[test]
    fn to_unix_millis_round_trips_through_anchor() {
        let anchor = ClockAnchor::capture_now();
        let t = MonoTime(anchor.mono_at_anchor) + Duration::from_secs(5);
        let wall = t.to_unix_millis(&anchor);
        assert_eq!(wall, anchor.wall_millis_at_anchor + 5000);
    }

    #[test]
    fn to_unix_millis_handles_times_before_anchor() {
        let anchor = ClockAnchor::capture_now();
        let earlier = MonoTime(anchor.mono_at_anchor - Duration::from_secs(2));
        let wall = earlier.to_unix_millis(&anchor);
        assert_eq!(wall, anchor.wall_millis_at_anchor - 2000);
    }

    #[test]
    fn virtual_clock_only_advances_when_told() {
        let clock = VirtualClock::new();
        let t0 = clock.now();
        let t1 = clock.now();
        assert_eq!(t0, t1);

        clock.advance(Duration::from_secs(1));
        let t2 = clock.now();
        assert!(t2 > t1);
        assert_eq!(t2, t1 + Duration::from_secs(1));
    }

    #[test]
    fn system_clock_is_monotonic_non_decreasing() {
        let clock = SystemMonoClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
