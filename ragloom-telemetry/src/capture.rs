//! In-memory tracing layer that records spans and events for assertions in tests.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{Event, Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A span that has closed.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedSpan {
    pub name: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Fields recorded at creation and through `Span::record`.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Wall time between creation and close.
    pub duration: Duration,
}

impl CapturedSpan {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// An event (log record).
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    /// Name of the innermost span the event was emitted in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    /// All fields, including `message`.
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }
}

#[derive(Debug, Default)]
struct Captured {
    spans: Vec<CapturedSpan>,
    events: Vec<CapturedEvent>,
}

/// A tracing layer that keeps closed spans and events in memory.
///
/// Clones share the same storage, so a test keeps one handle and installs
/// another:
///
/// ```rust,ignore
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = SpanCapture::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info_span!("work").in_scope(|| tracing::debug!(state = "done"));
/// });
/// assert_eq!(capture.spans_named("work").len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpanCapture {
    inner: Arc<RwLock<Captured>>,
}

impl SpanCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed spans, in close order.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.inner.read().map(|c| c.spans.clone()).unwrap_or_default()
    }

    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    /// Events, in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.inner.read().map(|c| c.events.clone()).unwrap_or_default()
    }

    /// Events emitted directly inside a span called `span_name`.
    pub fn events_in(&self, span_name: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.span.as_deref() == Some(span_name)).collect()
    }

    /// String values of `field` across all events, in emission order.
    pub fn field_values(&self, field: &str) -> Vec<String> {
        self.events().iter().filter_map(|e| e.str_field(field).map(str::to_string)).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut captured) = self.inner.write() {
            captured.spans.clear();
            captured.events.clear();
        }
    }
}

struct SpanStart(Instant);

struct SpanFields(BTreeMap<String, serde_json::Value>);

impl<S> Layer<S> for SpanCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        extensions.insert(SpanStart(Instant::now()));
        extensions.insert(SpanFields(visitor.0));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let captured = CapturedEvent {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            span: ctx.event_span(event).map(|s| s.name().to_string()),
            fields: visitor.0,
        };
        if let Ok(mut inner) = self.inner.write() {
            inner.events.push(captured);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let extensions = span.extensions();
        let duration = extensions.get::<SpanStart>().map(|s| s.0.elapsed()).unwrap_or_default();
        let fields = extensions.get::<SpanFields>().map(|f| f.0.clone()).unwrap_or_default();
        let metadata = span.metadata();

        let captured = CapturedSpan {
            name: metadata.name().to_string(),
            target: metadata.target().to_string(),
            parent: span.parent().map(|p| p.name().to_string()),
            fields,
            duration,
        };
        if let Ok(mut inner) = self.inner.write() {
            inner.spans.push(captured);
        }
    }
}

#[derive(Default)]
struct JsonVisitor(BTreeMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn captures_spans_events_and_recorded_fields() {
        let capture = SpanCapture::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("work", items = 3u64, outcome = tracing::field::Empty);
            span.in_scope(|| {
                tracing::debug!(state = "started", "begin");
            });
            span.record("outcome", "ok");
            tracing::info!("outside");
        });

        let spans = capture.spans_named("work");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].field("items"), Some(&serde_json::json!(3)));
        assert_eq!(spans[0].field("outcome"), Some(&serde_json::json!("ok")));

        let inside = capture.events_in("work");
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].str_field("state"), Some("started"));
        assert_eq!(inside[0].message(), Some("begin"));
        assert_eq!(inside[0].level, "DEBUG");

        assert_eq!(capture.events().len(), 2);
        assert_eq!(capture.field_values("state"), vec!["started".to_string()]);

        capture.clear();
        assert!(capture.events().is_empty());
        assert!(capture.spans().is_empty());
    }
}
