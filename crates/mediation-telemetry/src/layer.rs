use crate::log::{FieldVisitor, Log, SpanContext};
use std::collections::BTreeMap;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// A `tracing_subscriber::Layer` that projects spans and events into
/// redacted [`Log`] records and hands each one to `handler`. `timesource` is
/// injected so tests can assert on deterministic timestamps instead of
/// `SystemTime::now()`.
pub struct RedactingLayer<H, T>
where
    H: Fn(Log) + 'static,
    T: Fn() -> std::time::SystemTime + 'static,
{
    handler: H,
    timesource: T,
}

impl<H, T> RedactingLayer<H, T>
where
    H: Fn(Log) + 'static,
    T: Fn() -> std::time::SystemTime + 'static,
{
    pub fn new(handler: H, timesource: T) -> Self {
        Self { handler, timesource }
    }

    fn timestamp(&self) -> String {
        let system_time = (self.timesource)();
        match system_time.duration_since(std::time::UNIX_EPOCH) {
            Ok(duration) => format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos()),
            Err(_) => "0.000000000".to_string(),
        }
    }
}

impl<S, H, T> tracing_subscriber::Layer<S> for RedactingLayer<H, T>
where
    S: tracing::Subscriber + for<'lookup> LookupSpan<'lookup>,
    H: Fn(Log) + 'static,
    T: Fn() -> std::time::SystemTime + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: Context<'_, S>,
    ) {
        let span = ctx.span(id).expect("span must exist in on_new_span");
        let mut log = Log::from_metadata(span.metadata(), self.timestamp());
        attrs.record(&mut FieldVisitor(&mut log.fields));
        span.extensions_mut().insert(log);
    }

    fn on_record(&self, id: &tracing::span::Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let span = ctx.span(id).expect("span must exist in on_record");
        let mut extensions = span.extensions_mut();
        if let Some(log) = extensions.get_mut::<Log>() {
            values.record(&mut FieldVisitor(&mut log.fields));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut log = Log::from_metadata(event.metadata(), self.timestamp());
        event.record(&mut FieldVisitor(&mut log.fields));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let fields = extensions
                    .get::<Log>()
                    .map(|l| l.fields.clone())
                    .unwrap_or_else(BTreeMap::new);
                log.spans.push(SpanContext {
                    name: span.metadata().name(),
                    fields,
                });
            }
        }

        (self.handler)(log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::prelude::*;

    #[test]
    fn projects_event_fields_and_redacts_secrets() {
        let captured: Arc<Mutex<Vec<Log>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let layer = RedactingLayer::new(
            move |log| sink.lock().unwrap().push(log),
            || std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
        );
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info_span!("load", placement = "p1").in_scope(|| {
                tracing::info!(api_key = "super-secret", outcome = "fill", "finished");
            });
        });

        let logs = captured.lock().unwrap();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.fields.get("outcome").unwrap(), "fill");
        assert_eq!(log.fields.get("api_key").unwrap(), crate::redact::MASK);
        assert_eq!(log.spans.len(), 1);
        assert_eq!(log.spans[0].name, "load");
    }
}
