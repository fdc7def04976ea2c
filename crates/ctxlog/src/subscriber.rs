//! `tracing` integration.
//!
//! [`ContextLayer`] routes `tracing` events through a [`ContextLogger`], so
//! `tracing::info!` produces the same tagged lines as the logger's own
//! methods. Event fields are appended to the message as `key=value`.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

use crate::format::Arg;
use crate::level::Level;
use crate::logger::ContextLogger;

/// A tracing layer writing events through a [`ContextLogger`].
#[derive(Debug, Clone, Copy)]
pub struct ContextLayer {
    logger: &'static ContextLogger,
}

impl ContextLayer {
    /// Layer writing through `logger`.
    #[must_use]
    pub fn new(logger: &'static ContextLogger) -> Self {
        Self { logger }
    }

    /// Layer writing through the process-wide [`logger`](crate::logger).
    #[must_use]
    pub fn global() -> Self {
        Self::new(crate::logger())
    }

    /// Install a registry with this layer as the global default subscriber.
    pub fn init(self) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(self))
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldCollector {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            if self.message.is_none() {
                self.message = Some(value);
            }
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }

    fn into_text(self, fallback: &str) -> String {
        let mut text = self.message.unwrap_or_else(|| fallback.to_string());
        for (key, value) in self.fields {
            text.push(' ');
            text.push_str(&key);
            text.push('=');
            text.push_str(&value);
        }
        text
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }
}

impl<S> Layer<S> for ContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                collector
                    .fields
                    .push(("span".to_string(), spans.join("::")));
            }
        }

        let text = collector.into_text(metadata.name());
        self.logger.emit_from_file(
            Level::from(*metadata.level()),
            &[Arg::text(text)],
            metadata.file(),
        );
    }
}
