//! Ring buffer of recent log output.
//!
//! The buffer keeps the last [`LOG_BUFFER_CAPACITY`] log lines so that a
//! report can carry the output that led up to an error. Entries are evicted
//! strictly first-in, first-out.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Maximum number of entries kept.
pub const LOG_BUFFER_CAPACITY: usize = 50;

/// Default look-back window attached to a report.
pub const DEFAULT_LOG_WINDOW: Duration = Duration::from_millis(5000);

/// Placeholder for arguments that cannot be serialized.
const UNSERIALIZABLE_PLACEHOLDER: &str = "[Unserializable]";

/// Severity of a buffered log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Log,
    Warn,
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Log => "LOG",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A single buffered log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    #[must_use]
    pub fn new(kind: LogKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp,
        }
    }

    fn format_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.kind,
            self.message
        )
    }
}

/// One argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    /// Plain text, recorded verbatim.
    Text(String),
    /// A structured value.
    Value(Value),
    /// A value whose serialization failed.
    Unserializable,
}

impl LogArg {
    /// Captures any serializable value, falling back to
    /// [`LogArg::Unserializable`] when serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        serde_json::to_value(value).map_or(Self::Unserializable, Self::Value)
    }

    fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Value(Value::String(s)) => s.clone(),
            Self::Value(value @ (Value::Object(_) | Value::Array(_))) => {
                serde_json::to_string_pretty(value)
                    .unwrap_or_else(|_| UNSERIALIZABLE_PLACEHOLDER.to_string())
            }
            Self::Value(value) => value.to_string(),
            Self::Unserializable => UNSERIALIZABLE_PLACEHOLDER.to_string(),
        }
    }
}

impl From<&str> for LogArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for LogArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for LogArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Renders arguments the way a log line stores them: space-separated.
#[must_use]
pub fn format_args_line(args: &[LogArg]) -> String {
    args.iter().map(LogArg::render).collect::<Vec<_>>().join(" ")
}

/// Fixed-capacity FIFO of recent log lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    /// Creates a buffer holding [`LOG_BUFFER_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(LOG_BUFFER_CAPACITY)
    }

    /// Creates a buffer with a custom capacity (at least one entry).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Records a log call made now.
    pub fn record(&mut self, kind: LogKind, args: &[LogArg]) {
        self.push(LogEntry::new(kind, format_args_line(args), Utc::now()));
    }

    /// Appends an entry, evicting the oldest one once over capacity.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Formats every entry stamped within `window` before `until`, inclusive
    /// on both ends.
    ///
    /// # Arguments
    ///
    /// * `until` - End of the window, usually the report timestamp
    /// * `window` - How far back from `until` entries are included
    ///
    /// # Returns
    ///
    /// One `[timestamp] KIND: message` line per entry, oldest first, or an
    /// empty string when nothing matches.
    #[must_use]
    pub fn window_since(&self, until: DateTime<Utc>, window: Duration) -> String {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let from = until.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        self.entries
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= until)
            .map(LogEntry::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
