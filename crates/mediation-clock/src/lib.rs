//! A monotonic clock abstraction so every TTL/timeout computation in the
//! mediation core is expressed against an injected instant source rather
//! than `std::time::Instant::now()` directly, keeping tests deterministic.

use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An opaque, totally ordered, saturating-subtractable instant. Two
/// instants are only meaningfully comparable if they came from the same
/// [`MonotonicClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicInstant(u64);

impl MonotonicInstant {
    pub const ZERO: MonotonicInstant = MonotonicInstant(0);

    /// Milliseconds since whatever epoch the producing clock uses. Only
    /// meaningful for arithmetic against other instants from that clock.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn checked_duration_since(&self, earlier: MonotonicInstant) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_millis)
    }

    /// Saturating duration since `earlier`; negative/ahead-of-now gaps
    /// collapse to zero rather than panicking or wrapping.
    pub fn saturating_duration_since(&self, earlier: MonotonicInstant) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> MonotonicInstant {
        MonotonicInstant(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

impl Sub<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn sub(self, rhs: Duration) -> MonotonicInstant {
        MonotonicInstant(self.0.saturating_sub(rhs.as_millis() as u64))
    }
}

/// Source of monotonic time for the whole core. Production code is wired
/// to [`SystemMonotonicClock`]; tests use [`FakeClock`] to control TTL and
/// timeout behavior without real sleeps.
pub trait MonotonicClock: Send + Sync {
    fn now(&self) -> MonotonicInstant;
}

/// Wall clock backed by `std::time::Instant`, relative to the process
/// start (the instant this clock was constructed).
pub struct SystemMonotonicClock {
    origin: Instant,
}

impl SystemMonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now(&self) -> MonotonicInstant {
        MonotonicInstant(self.origin.elapsed().as_millis() as u64)
    }
}

/// A manually advanceable clock for deterministic tests of TTL/timeout
/// logic, shared by `Arc` so a test can hold a handle and the component
/// under test holds the same clock as a `dyn MonotonicClock`.
#[derive(Clone, Default)]
pub struct FakeClock {
    millis: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: MonotonicInstant) {
        self.millis.store(at.as_millis(), Ordering::SeqCst);
    }
}

impl MonotonicClock for FakeClock {
    fn now(&self) -> MonotonicInstant {
        MonotonicInstant(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(500));
        let t1 = clock.now();
        assert_eq!(t1.saturating_duration_since(t0), Duration::from_millis(500));
    }

    #[test]
    fn saturating_duration_never_panics_on_reversed_instants() {
        let earlier = MonotonicInstant::from_millis(1_000);
        let later = MonotonicInstant::from_millis(10);
        assert_eq!(later.saturating_duration_since(earlier), Duration::ZERO);
    }

    #[test]
    fn system_clock_is_monotonic_nondecreasing() {
        let clock = SystemMonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
