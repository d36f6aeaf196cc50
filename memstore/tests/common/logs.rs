//! Captures the records a store emits through its [`Logger`].

use std::sync::{Arc, Mutex};

use memstore::Logger;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// One captured event.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

struct CaptureLayer {
    records: Arc<Mutex<Vec<Record>>>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.records.lock().unwrap().push(Record {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Records captured by a [`Logger`] built with [`capture`].
#[derive(Clone, Default)]
pub struct Captured {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Captured {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    /// Records with `message`.
    pub fn with_message(&self, message: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| record.message == message)
            .collect()
    }

    /// Records at `level`.
    pub fn at(&self, level: Level) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .collect()
    }
}

/// A logger that captures into the returned handle.
pub fn capture() -> (Logger, Captured) {
    let captured = Captured::default();
    let layer = CaptureLayer {
        records: captured.records.clone(),
    };
    let dispatch = Dispatch::new(Registry::default().with(layer));
    (Logger::new(dispatch), captured)
}
