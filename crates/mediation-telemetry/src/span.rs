use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One side of a load/show event: the call was issued, or it settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Fill,
    NoFill,
    Timeout,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Fill => "fill",
            Outcome::NoFill => "no_fill",
            Outcome::Timeout => "timeout",
            Outcome::Error => "error",
        }
    }
}

/// A redacted, bounded record of one adapter or S2S call. This is the only
/// shape that ever crosses into a `TelemetrySink`; nothing upstream of
/// redaction is allowed to leak past [`crate::Projector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySpan {
    pub trace_id: String,
    pub placement: String,
    pub adapter: String,
    pub phase: Phase,
    pub outcome: Option<Outcome>,
    pub latency_ms: Option<u64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub redacted_metadata: BTreeMap<String, String>,
}

impl TelemetrySpan {
    pub fn start(trace_id: impl Into<String>, placement: impl Into<String>, adapter: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            placement: placement.into(),
            adapter: adapter.into(),
            phase: Phase::Start,
            outcome: None,
            latency_ms: None,
            error_code: None,
            error_message: None,
            redacted_metadata: BTreeMap::new(),
        }
    }

    pub fn finish(
        trace_id: impl Into<String>,
        placement: impl Into<String>,
        adapter: impl Into<String>,
        outcome: Outcome,
        latency_ms: u64,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            placement: placement.into(),
            adapter: adapter.into(),
            phase: Phase::Finish,
            outcome: Some(outcome),
            latency_ms: Some(latency_ms),
            error_code: None,
            error_message: None,
            redacted_metadata: BTreeMap::new(),
        }
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: &BTreeMap<String, String>) -> Self {
        self.redacted_metadata = crate::redact::redact_metadata(metadata);
        self
    }
}
