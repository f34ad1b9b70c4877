//! Structured, redacted telemetry for the mediation core: a `tracing`
//! projection layer for hosts that want raw structured logs, and a sampled,
//! bounded [`Projector`] for hosts that want batched spans and rolling
//! latency/outcome stats per placement/adapter.

mod layer;
mod log;
mod projector;
mod redact;
mod reservoir;
mod sink;
mod span;

pub use layer::RedactingLayer;
pub use log::{Log, LogLevel, SpanContext};
pub use projector::{ObservabilityConfig, OutcomeCounters, Projector};
pub use redact::{is_sensitive_key, redact_metadata, MASK};
pub use reservoir::{LatencyReservoir, Percentiles};
pub use sink::{NullSink, TelemetrySink};
pub use span::{Outcome, Phase, TelemetrySpan};
