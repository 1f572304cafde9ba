//! Wingman Monitor - runtime error capture and webhook reporting.
//!
//! This crate hooks the global error surfaces of a host application and
//! forwards a structured report for every captured error to a webhook.
//!
//! # Overview
//!
//! A [`Monitor`] reads the project's `.wingman.json`, then installs:
//!
//! - a panic hook (reported as `uncaughtException`),
//! - handlers on an optional [`HostSurface`] (`windowError`,
//!   `windowUnhandledRejection`),
//! - a `tracing` layer mirroring log output into a ring buffer
//!   (`consoleError` for error lines that look like errors),
//! - error tracking for tasks spawned via [`Monitor::spawn_tracked`]
//!   (`unhandledRejection`).
//!
//! Each report carries the log lines of the preceding five seconds, host
//! context and the stack trace. Delivery is a single best-effort POST.
//!
//! # Modules
//!
//! - [`config`]: Project config file and environment variables
//! - [`environment`]: Runtime environment classification
//! - [`filter`]: Reporting policy
//! - [`logs`]: Ring buffer of recent log output
//! - [`types`]: Report and webhook envelope types
//! - [`project`]: Host project metadata
//! - [`report`]: Diagnostic message assembly
//! - [`sender`]: Webhook delivery
//! - [`hooks`]: Host error surface and hook installation
//! - [`capture`]: `tracing` layer capturing log output
//! - [`monitor`]: The monitor state machine
//! - [`error`]: Error types

pub mod capture;
pub mod config;
pub mod environment;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod logs;
pub mod monitor;
pub mod project;
pub mod report;
pub mod sender;
pub mod types;

pub use capture::CaptureLayer;
pub use config::{ConfigError, ConfigStore, ConfigUpdate, NewConfig, ProjectConfig};
pub use environment::{
    environment_config, EnvironmentConfig, EnvironmentProbe, ProcessEnvironment,
    RuntimeEnvironment, StaticEnvironment,
};
pub use error::{MonitorError, Result};
pub use filter::{should_report, ErrorInfo, FilterContext};
pub use hooks::{ErrorEvent, ErrorHandler, HostSurface, RejectionEvent, RejectionHandler};
pub use logs::{LogArg, LogBuffer, LogEntry, LogKind};
pub use monitor::{Monitor, MonitorOptions, MonitorState};
pub use sender::{Sender, SenderConfig, SenderError};
pub use types::{ErrorReport, ErrorType, ProjectInfo, Severity};
