use std::collections::VecDeque;

const CAPACITY: usize = 200;

/// A FIFO-bounded latency sample set for one `(placement, adapter)` key.
/// Percentiles are computed from a sorted snapshot on read, matching the
/// "cheap to record, lazy to summarize" split used elsewhere in this crate.
#[derive(Debug, Default, Clone)]
pub struct LatencyReservoir {
    samples: VecDeque<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

impl LatencyReservoir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency_ms: u64) {
        if self.samples.len() == CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn percentiles(&self) -> Option<Percentiles> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let at = |fraction: f64| -> u64 {
            let idx = ((sorted.len() as f64 - 1.0) * fraction).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        Some(Percentiles {
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_to_capacity() {
        let mut r = LatencyReservoir::new();
        for i in 0..(CAPACITY + 50) {
            r.record(i as u64);
        }
        assert_eq!(r.len(), CAPACITY);
    }

    #[test]
    fn percentiles_of_uniform_range() {
        let mut r = LatencyReservoir::new();
        for i in 1..=100u64 {
            r.record(i);
        }
        let p = r.percentiles().unwrap();
        assert!(p.p50 >= 49 && p.p50 <= 51);
        assert!(p.p99 >= 98);
    }

    #[test]
    fn empty_reservoir_has_no_percentiles() {
        assert!(LatencyReservoir::new().percentiles().is_none());
    }
}
