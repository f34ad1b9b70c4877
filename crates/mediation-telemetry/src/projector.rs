use crate::reservoir::LatencyReservoir;
use crate::span::{Outcome, TelemetrySpan};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub sample_rate: f64,
    pub max_queue: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 1.0,
            max_queue: 1000,
        }
    }
}

impl ObservabilityConfig {
    /// Clamps `sample_rate` to `[0, 1]` and `max_queue` to its documented
    /// minimum of 100, so a malformed remote config can't wedge the
    /// projector into rejecting or keeping everything.
    pub fn normalized(mut self) -> Self {
        self.sample_rate = self.sample_rate.clamp(0.0, 1.0);
        self.max_queue = self.max_queue.max(100);
        self
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct OutcomeCounters {
    pub fills: u64,
    pub no_fills: u64,
    pub timeouts: u64,
    pub errors: u64,
}

impl OutcomeCounters {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Fill => self.fills += 1,
            Outcome::NoFill => self.no_fills += 1,
            Outcome::Timeout => self.timeouts += 1,
            Outcome::Error => self.errors += 1,
        }
    }
}

type Key = (String, String);

/// Samples, redacts, and buffers telemetry for later batch delivery to a
/// [`crate::sink::TelemetrySink`], while keeping a local rolling view
/// (outcome counters, latency percentiles) independent of whether any sink
/// is wired at all.
pub struct Projector {
    config: Mutex<ObservabilityConfig>,
    queue: Mutex<VecDeque<TelemetrySpan>>,
    counters: Mutex<HashMap<Key, OutcomeCounters>>,
    reservoirs: Mutex<HashMap<Key, LatencyReservoir>>,
}

impl Projector {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self {
            config: Mutex::new(config.normalized()),
            queue: Mutex::new(VecDeque::new()),
            counters: Mutex::new(HashMap::new()),
            reservoirs: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_config(&self, config: ObservabilityConfig) {
        *self.config.lock().unwrap() = config.normalized();
    }

    /// Records one span. `sample` is the caller's sampling decision (a
    /// uniform draw in `[0, 1)` compared against the configured rate) so the
    /// projector itself stays deterministic and test-friendly.
    pub fn record(&self, span: TelemetrySpan, sample: f64) {
        tracing::debug!(
            trace_id = %span.trace_id,
            placement = %span.placement,
            adapter = %span.adapter,
            phase = ?span.phase,
            outcome = ?span.outcome,
            latency_ms = span.latency_ms,
            "telemetry span"
        );

        let config = self.config.lock().unwrap().clone();
        if !config.enabled || sample >= config.sample_rate {
            return;
        }

        if let Some(outcome) = span.outcome {
            let key = (span.placement.clone(), span.adapter.clone());
            self.counters.lock().unwrap().entry(key.clone()).or_default().record(outcome);
            if let Some(latency_ms) = span.latency_ms {
                self.reservoirs.lock().unwrap().entry(key).or_default().record(latency_ms);
            }
        }

        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= config.max_queue {
            queue.pop_front();
        }
        queue.push_back(span);
    }

    /// Drains up to `max` pending spans for delivery to a sink. Returns
    /// fewer than `max` if the queue is shorter.
    pub fn drain(&self, max: usize) -> Vec<TelemetrySpan> {
        let mut queue = self.queue.lock().unwrap();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    pub fn counters_for(&self, placement: &str, adapter: &str) -> OutcomeCounters {
        self.counters
            .lock()
            .unwrap()
            .get(&(placement.to_string(), adapter.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn percentiles_for(&self, placement: &str, adapter: &str) -> Option<crate::reservoir::Percentiles> {
        self.reservoirs
            .lock()
            .unwrap()
            .get(&(placement.to_string(), adapter.to_string()))
            .and_then(|r| r.percentiles())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(outcome: Outcome, latency_ms: u64) -> TelemetrySpan {
        TelemetrySpan::finish("trace", "p1", "a", outcome, latency_ms)
    }

    #[test]
    fn disabled_projector_drops_everything() {
        let p = Projector::new(ObservabilityConfig { enabled: false, ..Default::default() });
        p.record(span(Outcome::Fill, 10), 0.0);
        assert_eq!(p.queue_len(), 0);
        assert_eq!(p.counters_for("p1", "a").fills, 0);
    }

    #[test]
    fn sample_rate_gates_recording() {
        let p = Projector::new(ObservabilityConfig { enabled: true, sample_rate: 0.5, max_queue: 100 });
        p.record(span(Outcome::Fill, 10), 0.9); // 0.9 >= 0.5, rejected
        p.record(span(Outcome::Fill, 20), 0.1); // 0.1 < 0.5, accepted
        assert_eq!(p.counters_for("p1", "a").fills, 1);
        assert_eq!(p.queue_len(), 1);
    }

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let p = Projector::new(ObservabilityConfig { enabled: true, sample_rate: 1.0, max_queue: 100 });
        for i in 0..105u64 {
            p.record(span(Outcome::Fill, i), 0.0);
        }
        assert_eq!(p.queue_len(), 100);
        let drained = p.drain(1);
        assert_eq!(drained[0].latency_ms, Some(5));
    }

    #[test]
    #[tracing_test::traced_test]
    fn counters_and_percentiles_accumulate() {
        let p = Projector::new(ObservabilityConfig::default());
        p.record(span(Outcome::Fill, 100), 0.0);
        p.record(span(Outcome::Timeout, 500), 0.0);
        let counters = p.counters_for("p1", "a");
        assert_eq!(counters.fills, 1);
        assert_eq!(counters.timeouts, 1);
        assert!(p.percentiles_for("p1", "a").is_some());
    }
}
