//! Per-adapter failure-window circuit breaker: Closed/Open/HalfOpen, gating
//! whether the mediation controller is allowed to call an adapter at all.

use mediation_clock::{MonotonicClock, MonotonicInstant};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(60_000),
            half_open_max_attempts: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Clamps to the documented minimums so a malformed remote config can't
    /// produce a breaker that never opens or never recovers.
    pub fn normalized(mut self) -> Self {
        self.failure_threshold = self.failure_threshold.max(1);
        self.reset_timeout = self.reset_timeout.max(Duration::from_millis(1_000));
        self.half_open_max_attempts = self.half_open_max_attempts.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { opened_at: MonotonicInstant },
    HalfOpen { remaining_probes: u32 },
}

/// A snapshot of breaker state safe to report to a diagnostics caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitStateSnapshot {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

struct Inner {
    state: State,
    consecutive_failures: u32,
}

/// Tracks one adapter's health. Cheap to hold many of (one per adapter
/// name); internal state lives behind a single mutex since contention per
/// adapter is low.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: std::sync::Arc<dyn MonotonicClock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: std::sync::Arc<dyn MonotonicClock>) -> Self {
        Self {
            config: config.normalized(),
            clock,
            inner: Mutex::new(Inner { state: State::Closed, consecutive_failures: 0 }),
        }
    }

    /// Reads current state, performing the lazy Open->HalfOpen transition
    /// if `reset_timeout` has elapsed since the circuit opened.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner);
        matches!(inner.state, State::Open { .. })
    }

    pub fn snapshot(&self) -> CircuitStateSnapshot {
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner);
        match inner.state {
            State::Closed => CircuitStateSnapshot::Closed,
            State::Open { .. } => CircuitStateSnapshot::Open,
            State::HalfOpen { .. } => CircuitStateSnapshot::HalfOpen,
        }
    }

    fn transition_if_due(&self, inner: &mut Inner) {
        if let State::Open { opened_at } = inner.state {
            let now = self.clock.now();
            if now.saturating_duration_since(opened_at) >= self.config.reset_timeout {
                tracing::debug!("circuit breaker transitioning open -> half_open");
                inner.state = State::HalfOpen { remaining_probes: self.config.half_open_max_attempts };
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        if !matches!(inner.state, State::Closed) {
            tracing::debug!("circuit breaker closing after successful probe");
        }
        inner.state = State::Closed;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner);
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opening"
                    );
                    inner.state = State::Open { opened_at: self.clock.now() };
                }
            }
            State::HalfOpen { .. } => {
                tracing::warn!("circuit breaker reopening after failed probe");
                inner.consecutive_failures = self.config.failure_threshold;
                inner.state = State::Open { opened_at: self.clock.now() };
            }
            State::Open { .. } => {}
        }
    }

    /// Admits one call if the breaker isn't open; a `HalfOpen` state only
    /// lets through up to `half_open_max_attempts` probes before the next
    /// call must wait for another `is_open()` check to resolve the window.
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner);
        match &mut inner.state {
            State::Closed => true,
            State::Open { .. } => false,
            State::HalfOpen { remaining_probes } => {
                if *remaining_probes == 0 {
                    false
                } else {
                    *remaining_probes -= 1;
                    true
                }
            }
        }
    }

    /// Runs `op` if the circuit admits a call, recording success/failure on
    /// the `Result` it produces. Short-circuits with [`CircuitBreakerError::Open`]
    /// otherwise, without ever invoking `op`.
    pub async fn execute<Fut, T, E>(&self, op: impl FnOnce() -> Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::Open);
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediation_clock::FakeClock;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn breaker(clock: FakeClock) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig { failure_threshold: 3, reset_timeout: Duration::from_millis(1_000), half_open_max_attempts: 1 },
            Arc::new(clock),
        )
    }

    #[test]
    fn opens_after_threshold_failures() {
        let clock = FakeClock::new();
        let b = breaker(clock);
        assert!(!b.is_open());
        b.record_failure();
        b.record_failure();
        assert!(!b.is_open());
        b.record_failure();
        assert!(b.is_open());
    }

    #[test]
    fn success_clears_the_failure_count() {
        let clock = FakeClock::new();
        let b = breaker(clock);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert!(!b.is_open());
    }

    #[test]
    fn half_opens_after_reset_timeout_and_recloses_on_success() {
        let clock = FakeClock::new();
        let b = breaker(clock.clone());
        for _ in 0..3 {
            b.record_failure();
        }
        assert!(b.is_open());
        clock.advance(Duration::from_millis(1_000));
        assert_eq!(b.snapshot(), CircuitStateSnapshot::HalfOpen);
        b.record_success();
        assert_eq!(b.snapshot(), CircuitStateSnapshot::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let clock = FakeClock::new();
        let b = breaker(clock.clone());
        for _ in 0..3 {
            b.record_failure();
        }
        clock.advance(Duration::from_millis(1_000));
        assert_eq!(b.snapshot(), CircuitStateSnapshot::HalfOpen);
        b.record_failure();
        assert_eq!(b.snapshot(), CircuitStateSnapshot::Open);
    }

    #[tokio::test]
    async fn execute_short_circuits_when_open_without_invoking_op() {
        let clock = FakeClock::new();
        let b = breaker(clock);
        for _ in 0..3 {
            b.record_failure();
        }
        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked2 = invoked.clone();
        let result: Result<(), CircuitBreakerError<&str>> = b
            .execute(|| async move {
                invoked2.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }
}
