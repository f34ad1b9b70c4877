use crate::span::TelemetrySpan;

/// Host-supplied telemetry transport. The core only ever enqueues redacted
/// spans; batching, retrying, and actually shipping them off-device is this
/// trait's job, not the projector's.
pub trait TelemetrySink: Send + Sync {
    fn submit(&self, spans: Vec<TelemetrySpan>);
}

/// Default sink used when a host wires none: drops everything. Useful as a
/// safe placeholder and in tests that only care about local counters.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn submit(&self, _spans: Vec<TelemetrySpan>) {}
}
