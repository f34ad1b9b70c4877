use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn level_from_tracing(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// A span name captured on the path from root to the event that produced a
/// [`Log`], mirroring how a host-side log viewer reconstructs call context
/// without needing the full `tracing` span stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanContext {
    pub name: &'static str,
    pub fields: BTreeMap<String, String>,
}

/// A structured projection of one `tracing` span or event, redacted the same
/// way a [`crate::span::TelemetrySpan`] is before it reaches a sink. Produced
/// by [`crate::layer::RedactingLayer`] for hosts that wire their own
/// `tracing_subscriber::Registry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub target: String,
    pub name: &'static str,
    pub timestamp: String,
    pub fields: BTreeMap<String, String>,
    pub spans: Vec<SpanContext>,
}

impl Log {
    pub fn from_metadata(metadata: &tracing::Metadata, timestamp: String) -> Self {
        Self {
            level: level_from_tracing(metadata.level()),
            target: metadata.target().to_string(),
            name: metadata.name(),
            timestamp,
            fields: BTreeMap::new(),
            spans: Vec::new(),
        }
    }
}

pub(crate) struct FieldVisitor<'a>(pub &'a mut BTreeMap<String, String>);

impl<'a> tracing::field::Visit for FieldVisitor<'a> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        let redacted = if crate::redact::is_sensitive_key(field.name()) {
            crate::redact::MASK.to_string()
        } else {
            value.to_string()
        };
        self.0.insert(field.name().to_string(), redacted);
    }

    fn record_error(&mut self, field: &tracing::field::Field, value: &(dyn std::error::Error + 'static)) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        let redacted = if crate::redact::is_sensitive_key(field.name()) {
            crate::redact::MASK.to_string()
        } else {
            rendered
        };
        self.0.insert(field.name().to_string(), redacted);
    }
}
