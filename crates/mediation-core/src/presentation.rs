//! The Presentation Coordinator (§4.8): per-placement busy/idle state so at
//! most one show is ever in flight for a given placement, with a hard
//! render-timeout release so a wedged adapter can't leak the slot forever.

use crate::executor::Executor;
use mediation_clock::{MonotonicClock, MonotonicInstant};
use mediation_registry::{AdapterError, AdapterErrorCode, ShowCallbacks};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Slot {
    attempt: u64,
    acquired_at: MonotonicInstant,
}

/// Tracks one busy/idle flag per placement. `try_acquire`/`release_attempt`
/// are the fast path a well-behaved show goes through; `arm_watchdog` is a
/// backstop that forces a terminal `on_error` for adapters that never call
/// back at all.
pub struct PresentationCoordinator {
    clock: Arc<dyn MonotonicClock>,
    executor: Arc<dyn Executor>,
    render_timeout: Duration,
    /// Off in test mode: a real background sleep has no place in a
    /// synchronous test runtime, so test code relies on lazy eviction
    /// (`evict_if_stale`, driven by the injected clock) instead.
    watchdog_enabled: bool,
    next_attempt: AtomicU64,
    slots: Mutex<HashMap<String, Slot>>,
}

impl PresentationCoordinator {
    pub fn new(clock: Arc<dyn MonotonicClock>, executor: Arc<dyn Executor>, render_timeout: Duration, watchdog_enabled: bool) -> Self {
        Self { clock, executor, render_timeout, watchdog_enabled, next_attempt: AtomicU64::new(0), slots: Mutex::new(HashMap::new()) }
    }

    /// Evicts a slot if its occupant has outlived the render timeout,
    /// treating an unresponsive show as failed rather than leaving the
    /// placement permanently busy.
    fn evict_if_stale(&self, slots: &mut HashMap<String, Slot>, placement: &str) {
        let now = self.clock.now();
        if let Some(slot) = slots.get(placement) {
            if now.saturating_duration_since(slot.acquired_at) >= self.render_timeout {
                tracing::warn!(placement, "show exceeded render timeout, forcing the slot idle");
                slots.remove(placement);
            }
        }
    }

    /// Returns the attempt id and marks the placement busy if it was idle,
    /// or `None` if another attempt already holds the slot. The caller is
    /// responsible for releasing the returned attempt (directly, or through
    /// a callback wrapper) once the show settles, and should arm a watchdog
    /// via `arm_watchdog` if it wants the render timeout enforced.
    pub fn try_acquire(self: &Arc<Self>, placement: &str) -> Option<u64> {
        let mut slots = self.slots.lock().unwrap();
        self.evict_if_stale(&mut slots, placement);
        if slots.contains_key(placement) {
            return None;
        }
        let attempt = self.next_attempt.fetch_add(1, Ordering::SeqCst);
        slots.insert(placement.to_string(), Slot { attempt, acquired_at: self.clock.now() });
        Some(attempt)
    }

    /// Spawns the background render-timeout watchdog for `attempt`. If the
    /// timeout elapses before the slot is released (i.e. no terminal
    /// callback ever arrived), the slot is freed and `on_error` is forced on
    /// `callbacks` so the show is treated as failed rather than left
    /// suspended forever (§6 "every show ends with exactly one terminal
    /// callback").
    pub fn arm_watchdog(self: &Arc<Self>, placement: &str, attempt: u64, callbacks: Arc<dyn ShowCallbacks>) {
        if !self.watchdog_enabled {
            return;
        }
        let this = self.clone();
        let placement = placement.to_string();
        let render_timeout = self.render_timeout;
        self.executor.spawn(Box::pin(async move {
            tokio::time::sleep(render_timeout).await;
            if this.release_attempt(&placement, attempt) {
                tracing::warn!(placement = %placement, "render timeout elapsed without a terminal callback, forcing on_error");
                callbacks.on_error(&AdapterError::recoverable(AdapterErrorCode::Timeout, "show exceeded the render timeout without a terminal callback"));
            }
        }));
    }

    /// Releases the slot if it is still held by `attempt`, returning whether
    /// it actually freed anything. Guarding on the attempt id means a stale
    /// release (a late watchdog firing, or a caller releasing twice) can
    /// never clobber a placement a later, legitimate attempt already holds.
    pub fn release_attempt(&self, placement: &str, attempt: u64) -> bool {
        let mut slots = self.slots.lock().unwrap();
        if slots.get(placement).map(|slot| slot.attempt) == Some(attempt) {
            slots.remove(placement);
            true
        } else {
            false
        }
    }

    pub fn is_busy(&self, placement: &str) -> bool {
        let mut slots = self.slots.lock().unwrap();
        self.evict_if_stale(&mut slots, placement);
        slots.contains_key(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use mediation_clock::FakeClock;

    fn coordinator(clock: FakeClock, render_timeout: Duration) -> Arc<PresentationCoordinator> {
        Arc::new(PresentationCoordinator::new(Arc::new(clock), Arc::new(InlineExecutor), render_timeout, false))
    }

    #[test]
    fn second_acquire_is_rejected_while_busy() {
        let coordinator = coordinator(FakeClock::new(), Duration::from_secs(3600));
        assert!(coordinator.try_acquire("p1").is_some());
        assert!(coordinator.try_acquire("p1").is_none());
    }

    #[test]
    fn release_frees_the_slot_for_reacquire() {
        let coordinator = coordinator(FakeClock::new(), Duration::from_secs(3600));
        let attempt = coordinator.try_acquire("p1").unwrap();
        assert!(coordinator.release_attempt("p1", attempt));
        assert!(coordinator.try_acquire("p1").is_some());
    }

    #[test]
    fn stale_release_does_not_clobber_a_later_attempt() {
        let coordinator = coordinator(FakeClock::new(), Duration::from_secs(3600));
        let first = coordinator.try_acquire("p1").unwrap();
        assert!(coordinator.release_attempt("p1", first));
        let second = coordinator.try_acquire("p1").unwrap();
        assert!(!coordinator.release_attempt("p1", first));
        assert!(coordinator.is_busy("p1"));
        assert!(coordinator.release_attempt("p1", second));
    }

    #[test]
    fn independent_placements_do_not_contend() {
        let coordinator = coordinator(FakeClock::new(), Duration::from_secs(3600));
        assert!(coordinator.try_acquire("p1").is_some());
        assert!(coordinator.try_acquire("p2").is_some());
    }

    #[test]
    #[tracing_test::traced_test]
    fn stale_slot_is_evicted_past_the_render_timeout() {
        let clock = FakeClock::new();
        let coordinator = coordinator(clock.clone(), Duration::from_millis(500));
        assert!(coordinator.try_acquire("p1").is_some());
        clock.advance(Duration::from_millis(600));
        assert!(!coordinator.is_busy("p1"));
        assert!(coordinator.try_acquire("p1").is_some());
    }
}
