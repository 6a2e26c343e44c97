//! Scoped log capture for asserting on engine tracing output.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

/// A captured log event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Events captured while a closure ran.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    entries: Vec<LogEntry>,
}

impl CapturedLogs {
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn contains_message(&self, message: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(message))
    }

    #[must_use]
    pub fn with_message(&self, message: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.message.contains(message))
            .collect()
    }

    #[must_use]
    pub fn at_level(&self, level: Level) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|e| e.level == Level::WARN)
    }

    /// One line per event, for assertion messages.
    #[must_use]
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "No logs captured".to_string();
        }
        self.entries
            .iter()
            .map(|entry| {
                let fields = entry
                    .fields
                    .iter()
                    .map(|(k, v)| format!(" {k}={v}"))
                    .collect::<String>();
                format!("[{}] {}: {}{fields}", entry.level, entry.target, entry.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct CaptureLayer {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.entries.lock().push(LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
///
/// `directives` is an `EnvFilter` string such as `"popgate=debug"`.
pub fn capture_logs<T>(directives: &str, f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(CaptureLayer {
            entries: entries.clone(),
        });

    let value = tracing::subscriber::with_default(subscriber, f);
    let captured = CapturedLogs {
        entries: std::mem::take(&mut *entries.lock()),
    };
    (value, captured)
}

/// Assert that captured logs contain a message at the given level.
#[macro_export]
macro_rules! assert_log_contains {
    ($logs:expr, $level:expr, $message:expr) => {{
        let logs = &$logs;
        let found = logs
            .entries()
            .iter()
            .any(|e| e.level == $level && e.message.contains($message));
        assert!(
            found,
            "Expected log with level {} containing '{}'\nCaptured logs:\n{}",
            $level,
            $message,
            logs.render()
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_scoped_to_closure() {
        let (value, logs) = capture_logs("debug", || {
            tracing::debug!(reader_id = "r1", "inside");
            7
        });
        tracing::debug!("outside");

        assert_eq!(value, 7);
        assert_eq!(logs.entries().len(), 1);
        assert_eq!(logs.entries()[0].field("reader_id"), Some("r1"));
        assert_log_contains!(logs, Level::DEBUG, "inside");
    }

    #[test]
    fn test_filter_applies() {
        let ((), logs) = capture_logs("warn", || {
            tracing::info!("quiet");
            tracing::warn!("loud");
        });
        assert!(logs.has_warnings());
        assert!(!logs.contains_message("quiet"));
        assert_eq!(logs.at_level(Level::WARN).len(), 1);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(CapturedLogs::default().render(), "No logs captured");
    }
}
