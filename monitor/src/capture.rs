//! Log capture for the host application.
//!
//! [`CaptureLayer`] is a `tracing_subscriber` layer that mirrors the host's
//! log output into the monitor's ring buffer. It sits beside the host's own
//! layers, so their output is unchanged. ERROR events that look like errors
//! are additionally considered for a `consoleError` report.
//!
//! The layer is inert while its monitor is stopped. Events emitted by this
//! crate are never captured, so the monitor's own logging cannot feed back
//! into reports.
//!
//! ```no_run
//! use tracing_subscriber::prelude::*;
//! use wingman_monitor::{Monitor, MonitorOptions};
//!
//! let monitor = Monitor::new(MonitorOptions::new("."));
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(monitor.capture_layer())
//!     .init();
//! monitor.start();
//! ```

use std::fmt;
use std::sync::Weak;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::logs::{LogArg, LogKind};
use crate::monitor::Shared;

/// Target prefix of events emitted by this crate.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Words that make an error-level log line count as an error.
const ERROR_WORDS: &[&str] = &["error", "exception", "panic", "failed"];

/// Layer feeding host log events into a monitor.
pub struct CaptureLayer {
    shared: Weak<Shared>,
}

impl CaptureLayer {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }
}

impl fmt::Debug for CaptureLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureLayer")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }
        let Some(kind) = log_kind(*metadata.level()) else {
            return;
        };
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if !shared.is_capturing() {
            return;
        }

        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let has_error_field = visitor.has_error_field;
        shared.on_log(kind, &visitor.into_args(), has_error_field);
    }
}

/// INFO maps to `log`; DEBUG and TRACE are not captured.
fn log_kind(level: Level) -> Option<LogKind> {
    match level {
        Level::ERROR => Some(LogKind::Error),
        Level::WARN => Some(LogKind::Warn),
        Level::INFO => Some(LogKind::Log),
        _ => None,
    }
}

/// Heuristic deciding whether an error-level line is an actual error.
pub(crate) fn looks_like_error(message: &str, has_error_field: bool) -> bool {
    if has_error_field {
        return true;
    }
    let lower = message.to_lowercase();
    ERROR_WORDS.iter().any(|word| lower.contains(word))
}

/// Collects event fields as log arguments, message first.
#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<LogArg>,
    has_error_field: bool,
}

impl LogVisitor {
    fn into_args(self) -> Vec<LogArg> {
        self.message
            .map(LogArg::Text)
            .into_iter()
            .chain(self.fields)
            .collect()
    }
}

impl Visit for LogVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            if field.name() == "error" {
                self.has_error_field = true;
            }
            self.fields
                .push(LogArg::Text(format!("{}={:?}", field.name(), value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            if field.name() == "error" {
                self.has_error_field = true;
            }
            self.fields
                .push(LogArg::Text(format!("{}={}", field.name(), value)));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.has_error_field = true;
        self.fields
            .push(LogArg::Text(format!("{}={}", field.name(), value)));
    }
}
