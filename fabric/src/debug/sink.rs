//! Structured log sink
//!
//! Components log through a [`Logger`], which stamps each event with the
//! component name and the current correlation id, then hands it to every
//! registered [`LogSink`]. The default sink forwards to `tracing`; tests
//! attach a [`MemorySink`] to assert on what was logged.

use super::trace_context;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One structured log event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub component: &'static str,
    pub correlation_id: Option<String>,
    pub message: String,
    pub fields: Map<String, Value>,
}

/// Destination for log events.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: &LogEvent);
}

/// Forwards events to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: &LogEvent) {
        let fields = Value::Object(event.fields.clone());
        let correlation_id = event.correlation_id.as_deref().unwrap_or("-");
        let component = event.component;
        let message = event.message.as_str();

        match event.level {
            LogLevel::Trace => {
                tracing::trace!(component, correlation_id, fields = %fields, "{}", message)
            }
            LogLevel::Debug => {
                tracing::debug!(component, correlation_id, fields = %fields, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(component, correlation_id, fields = %fields, "{}", message)
            }
            LogLevel::Warn => {
                tracing::warn!(component, correlation_id, fields = %fields, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(component, correlation_id, fields = %fields, "{}", message)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// True if an event at `level` contains `needle` in its message.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: &LogEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Per-component logging handle. Clones share the same sink list.
#[derive(Clone)]
pub struct Logger {
    component: &'static str,
    sinks: Arc<RwLock<Vec<Arc<dyn LogSink>>>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("component", &self.component)
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

impl Logger {
    /// Logger writing to `tracing`.
    pub fn new(component: &'static str) -> Self {
        Self::with_sinks(component, vec![Arc::new(TracingSink)])
    }

    pub fn with_sinks(component: &'static str, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            component,
            sinks: Arc::new(RwLock::new(sinks)),
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks.write().push(sink);
    }

    pub fn event(&self, level: LogLevel, message: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            logger: self,
            event: LogEvent {
                level,
                component: self.component,
                correlation_id: None,
                message: message.into(),
                fields: Map::new(),
            },
        }
    }

    pub fn debug(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Error, message)
    }

    fn dispatch(&self, event: &LogEvent) {
        let sinks: Vec<Arc<dyn LogSink>> = self.sinks.read().clone();
        for sink in sinks {
            sink.emit(event);
        }
    }
}

/// Event under construction. Nothing is logged until [`EventBuilder::emit`].
#[must_use = "call .emit() to publish the event"]
pub struct EventBuilder<'a> {
    logger: &'a Logger,
    event: LogEvent,
}

impl EventBuilder<'_> {
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.event.fields.insert(key.to_string(), value.into());
        self
    }

    /// Override the ambient correlation id.
    pub fn correlation(mut self, id: &str) -> Self {
        self.event.correlation_id = Some(id.to_string());
        self
    }

    pub fn emit(mut self) {
        if self.event.correlation_id.is_none() {
            self.event.correlation_id = trace_context::current_trace_id();
        }
        self.logger.dispatch(&self.event);
    }
}
