//! The error monitor.
//!
//! A [`Monitor`] loads the project config, installs hooks on the global
//! error surfaces and turns every captured error into one [`ErrorReport`]
//! posted to the webhook.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start()--> Started --stop()--> Stopped
//! ```
//!
//! `start()` leaves the monitor stopped when no config exists or the config
//! is disabled. A stopped monitor can be started again.
//!
//! # Delivery
//!
//! Reports are delivered at most once. Hooks fire in synchronous contexts
//! (panic hook, log events), so their deliveries are spawned onto the tokio
//! runtime that was current when `start()` ran; without a runtime they are
//! dropped. Manual reports are awaited by the caller.
//!
//! Panics are the exception. A panic outside a spawned task (the main future
//! of `block_on`, a plain thread) usually tears down the runtime while
//! unwinding, so the panic hook posts the report itself and blocks until the
//! attempt finishes. Panics inside spawned tasks are caught by tokio and
//! leave the runtime running, so those reports are spawned like the rest.
//!
//! # Example
//!
//! ```no_run
//! use wingman_monitor::{Monitor, MonitorOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let monitor = Monitor::new(MonitorOptions::new("."));
//!     monitor.start();
//!
//!     if let Err(e) = std::fs::read("missing.txt") {
//!         monitor.report_custom_error(&e, None).await;
//!     }
//!
//!     monitor.stop();
//! }
//! ```

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{looks_like_error, CaptureLayer};
use crate::config::{resolve_webhook_url, ConfigStore};
use crate::environment::{EnvironmentProbe, ProcessEnvironment};
use crate::filter::{should_report, ErrorInfo, FilterContext};
use crate::hooks::{
    install_panic_hook, install_surface_hooks, ErrorEvent, HostSurface, InstalledHooks,
    RejectionEvent,
};
use crate::logs::{format_args_line, LogArg, LogBuffer, LogKind, DEFAULT_LOG_WINDOW};
use crate::project::project_info;
use crate::report::{enrich_message, ReportContext};
use crate::sender::{Sender, SenderConfig, DELIVERY_THREAD_NAME};
use crate::types::{ErrorReport, ErrorType};

/// Lifecycle state of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Stopped,
    Started,
}

/// Options for building a [`Monitor`].
#[derive(Clone)]
pub struct MonitorOptions {
    /// Project root holding `.wingman.json` and `Cargo.toml`.
    pub project_path: PathBuf,

    /// Webhook override; falls back to `WINGMAN_WEBHOOK_URL`, then the default.
    pub webhook_url: Option<String>,

    /// Host error surface to hook, if the host has one.
    pub surface: Option<Arc<HostSurface>>,

    /// Whether to install the process panic hook.
    pub panic_hook: bool,

    /// Source of the runtime environment classification.
    pub probe: Arc<dyn EnvironmentProbe>,

    /// How far back log lines are attached to a report.
    pub log_window: Duration,
}

impl fmt::Debug for MonitorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorOptions")
            .field("project_path", &self.project_path)
            .field("webhook_url", &self.webhook_url)
            .field("surface", &self.surface)
            .field("panic_hook", &self.panic_hook)
            .field("environment", &self.probe.environment())
            .field("log_window", &self.log_window)
            .finish()
    }
}

impl MonitorOptions {
    #[must_use]
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            webhook_url: None,
            surface: None,
            panic_hook: true,
            probe: Arc::new(ProcessEnvironment),
            log_window: DEFAULT_LOG_WINDOW,
        }
    }

    #[must_use]
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_surface(mut self, surface: Arc<HostSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: impl EnvironmentProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Leaves the process panic hook alone.
    #[must_use]
    pub fn without_panic_hook(mut self) -> Self {
        self.panic_hook = false;
        self
    }
}

/// Captures runtime errors and reports them to a webhook.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("project_path", &self.shared.project_path)
            .field("state", &self.state())
            .finish()
    }
}

impl Monitor {
    /// Creates a stopped monitor.
    ///
    /// The webhook URL is resolved here; the config is read by
    /// [`start`](Self::start).
    ///
    /// # Arguments
    ///
    /// * `options` - Project path, webhook override, hooks and environment probe
    #[must_use]
    pub fn new(options: MonitorOptions) -> Self {
        let webhook_url = resolve_webhook_url(options.webhook_url.as_deref());

        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(ConfigStore::new(options.project_path.clone())),
                project_path: options.project_path,
                surface: options.surface,
                panic_hook: options.panic_hook,
                probe: options.probe,
                log_window: options.log_window,
                sender: Sender::new(SenderConfig::new(webhook_url)),
                lifecycle: Mutex::new(Lifecycle::default()),
                logs: Mutex::new(LogBuffer::new()),
                capturing: AtomicBool::new(false),
            }),
        }
    }

    /// Loads the config and installs every hook.
    ///
    /// Stays stopped, logging why, when no config exists or it is disabled.
    /// Calling `start` on a started monitor does nothing.
    pub fn start(&self) {
        if self.state() == MonitorState::Started {
            warn!("Monitor already started");
            return;
        }

        let Some(config) = lock(&self.shared.store).load() else {
            info!(
                project = %self.shared.project_path.display(),
                "No Wingman config found, monitoring not started"
            );
            return;
        };
        if !config.enabled {
            info!("Wingman monitoring is disabled, not starting");
            return;
        }

        let runtime = Handle::try_current().ok();
        let has_runtime = runtime.is_some();
        let hooks = self.install_hooks();

        {
            let mut lifecycle = lock(&self.shared.lifecycle);
            lifecycle.state = MonitorState::Started;
            lifecycle.hooks = hooks;
            lifecycle.runtime = runtime;
        }
        self.shared.capturing.store(true, Ordering::SeqCst);

        info!(
            environment = %config.environment,
            webhook = %self.shared.sender.webhook_url(),
            "Wingman monitoring started"
        );
        if !has_runtime {
            warn!("No tokio runtime available, automatic reports will be dropped");
        }
    }

    /// Uninstalls every hook, restoring the handlers that were there before.
    pub fn stop(&self) {
        let mut hooks = {
            let mut lifecycle = lock(&self.shared.lifecycle);
            if lifecycle.state != MonitorState::Started {
                return;
            }
            lifecycle.state = MonitorState::Stopped;
            lifecycle.runtime = None;
            std::mem::take(&mut lifecycle.hooks)
        };
        self.shared.capturing.store(false, Ordering::SeqCst);
        hooks.uninstall();

        info!("Wingman monitoring stopped");
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        lock(&self.shared.lifecycle).state
    }

    /// `true` while started with an enabled config.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == MonitorState::Started && lock(&self.shared.store).is_enabled()
    }

    /// Reports `error` explicitly and waits for the delivery attempt.
    ///
    /// Manual reports skip the reporting policy, so they are sent even in
    /// development. Requires an active monitor. The error's source chain, if
    /// any, becomes the stack.
    ///
    /// # Arguments
    ///
    /// * `error` - The error to report
    /// * `metadata` - Extra fields attached to the report as-is
    pub async fn report_custom_error<E>(&self, error: &E, metadata: Option<Map<String, Value>>)
    where
        E: StdError + ?Sized,
    {
        if !self.is_active() {
            debug!("Monitor inactive, custom error not reported");
            return;
        }

        let stack = source_chain(error);
        let Some(report) = self.shared.build_report(
            ErrorType::CustomError,
            &error.to_string(),
            stack.as_deref(),
            metadata,
        ) else {
            return;
        };

        self.shared.sender.report_error(&report).await;
    }

    /// Returns the log capture layer bound to this monitor.
    ///
    /// Add it to the host's subscriber once; it only records while the
    /// monitor is started.
    #[must_use]
    pub fn capture_layer(&self) -> CaptureLayer {
        CaptureLayer::new(Arc::downgrade(&self.shared))
    }

    /// Spawns `future` on the current tokio runtime, reporting an `Err`
    /// outcome as an unhandled rejection.
    ///
    /// The handle resolves to `Some(value)` on success and `None` on error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn_tracked<F, T, E>(&self, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            match future.await {
                Ok(value) => Some(value),
                Err(e) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.on_task_error(&e.to_string());
                    }
                    None
                }
            }
        })
    }

    fn install_hooks(&self) -> InstalledHooks {
        let weak = Arc::downgrade(&self.shared);

        let panic = self.shared.panic_hook.then(|| {
            let weak = weak.clone();
            install_panic_hook(move |info| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_panic(info);
                }
            })
        });

        let surface = self.shared.surface.as_ref().map(|surface| {
            let on_error = weak.clone();
            let on_rejection = weak.clone();
            install_surface_hooks(
                surface,
                move |event| {
                    if let Some(shared) = on_error.upgrade() {
                        shared.on_surface_error(event);
                    }
                },
                move |event| {
                    if let Some(shared) = on_rejection.upgrade() {
                        shared.on_surface_rejection(event);
                    }
                },
            )
        });

        InstalledHooks {
            panic,
            surface,
            tracked_tasks: true,
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    state: MonitorState,
    hooks: InstalledHooks,
    runtime: Option<Handle>,
}

/// State shared between a monitor and the hooks it installed.
pub(crate) struct Shared {
    project_path: PathBuf,
    surface: Option<Arc<HostSurface>>,
    panic_hook: bool,
    probe: Arc<dyn EnvironmentProbe>,
    log_window: Duration,
    sender: Sender,
    store: Mutex<ConfigStore>,
    lifecycle: Mutex<Lifecycle>,
    logs: Mutex<LogBuffer>,
    capturing: AtomicBool,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        lifecycle.hooks.uninstall();
    }
}

impl Shared {
    pub(crate) fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Records a captured log line; error lines may become a report.
    pub(crate) fn on_log(&self, kind: LogKind, args: &[LogArg], has_error_field: bool) {
        lock(&self.logs).record(kind, args);

        if kind == LogKind::Error {
            let message = format_args_line(args);
            if looks_like_error(&message, has_error_field) {
                self.capture(
                    ErrorType::ConsoleError,
                    ErrorInfo::new(message),
                    FilterContext::default(),
                    None,
                );
            }
        }
    }

    fn on_panic(&self, info: &PanicHookInfo<'_>) {
        let current = thread::current();
        // A failing blocking delivery must not report itself.
        if current.name() == Some(DELIVERY_THREAD_NAME) {
            return;
        }

        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Box<dyn Any>".to_string());

        let backtrace = Backtrace::force_capture().to_string();
        let stack = match info.location() {
            Some(location) => format!("at {location}\n{backtrace}"),
            None => backtrace,
        };

        let mut metadata = Map::new();
        if let Some(name) = current.name() {
            metadata.insert("thread".to_string(), Value::String(name.to_string()));
        }

        let Some((report, runtime)) = self.prepare(
            ErrorType::UncaughtException,
            ErrorInfo {
                message: format!("panicked: {message}"),
                stack: Some(stack),
            },
            FilterContext::default(),
            Some(metadata),
        ) else {
            return;
        };

        // Spawned tasks catch their panics, so their runtime outlives this hook.
        match runtime {
            Some(runtime) if tokio::task::try_id().is_some() => {
                let sender = self.sender.clone();
                runtime.spawn(async move {
                    sender.report_error(&report).await;
                });
            }
            _ => {
                self.sender.report_error_blocking(&report);
            }
        }
    }

    fn on_task_error(&self, reason: &str) {
        if !lock(&self.lifecycle).hooks.tracked_tasks {
            return;
        }
        self.capture(
            ErrorType::UnhandledRejection,
            ErrorInfo::new(reason),
            FilterContext::default(),
            None,
        );
    }

    fn on_surface_error(&self, event: &ErrorEvent) {
        let location = event.location();
        let stack = event.stack.clone().or_else(|| location.as_ref().map(|l| format!("at {l}")));

        let metadata = location.map(|l| {
            let mut metadata = Map::new();
            metadata.insert("location".to_string(), Value::String(l));
            metadata
        });

        self.capture(
            ErrorType::WindowError,
            ErrorInfo {
                message: event.message.clone(),
                stack,
            },
            FilterContext {
                status: event.status,
                aborted: false,
            },
            metadata,
        );
    }

    fn on_surface_rejection(&self, event: &RejectionEvent) {
        self.capture(
            ErrorType::WindowUnhandledRejection,
            ErrorInfo {
                message: event.reason.clone(),
                stack: event.stack.clone(),
            },
            FilterContext {
                status: event.status,
                aborted: event.aborted,
            },
            None,
        );
    }

    /// Filters an automatically captured error and spawns its delivery.
    fn capture(
        &self,
        error_type: ErrorType,
        error: ErrorInfo,
        context: FilterContext,
        metadata: Option<Map<String, Value>>,
    ) {
        let Some((report, runtime)) = self.prepare(error_type, error, context, metadata) else {
            return;
        };

        let Some(runtime) = runtime else {
            debug!(?error_type, "No async runtime, dropping error report");
            return;
        };

        let sender = self.sender.clone();
        runtime.spawn(async move {
            sender.report_error(&report).await;
        });
    }

    /// Applies the reporting policy and builds the report, returning it with
    /// the runtime captured at `start()`.
    ///
    /// `None` when the monitor is stopped, the error is filtered out, or no
    /// config is loaded.
    fn prepare(
        &self,
        error_type: ErrorType,
        error: ErrorInfo,
        context: FilterContext,
        metadata: Option<Map<String, Value>>,
    ) -> Option<(ErrorReport, Option<Handle>)> {
        let runtime = {
            let lifecycle = lock(&self.lifecycle);
            if lifecycle.state != MonitorState::Started {
                return None;
            }
            lifecycle.runtime.clone()
        };

        if !should_report(&error, &context, self.probe.as_ref()) {
            debug!(?error_type, "Error filtered out");
            return None;
        }

        let report =
            self.build_report(error_type, &error.message, error.stack.as_deref(), metadata)?;
        Some((report, runtime))
    }

    /// Assembles a report, or `None` when no config is loaded.
    fn build_report(
        &self,
        error_type: ErrorType,
        message: &str,
        stack: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Option<ErrorReport> {
        let (access_token, environment) = {
            let store = lock(&self.store);
            let config = store.config()?;
            (config.access_token.clone(), config.environment.clone())
        };

        let timestamp = Utc::now();
        let recent_logs = lock(&self.logs).window_since(timestamp, self.log_window);
        let context = self
            .surface
            .as_deref()
            .map(ReportContext::from_surface)
            .unwrap_or_default();

        Some(ErrorReport {
            message: enrich_message(message, &recent_logs, &context, stack),
            error_type,
            severity: error_type.severity(),
            environment,
            access_token,
            timestamp,
            stack: stack.map(str::to_string),
            project_info: Some(project_info(&self.project_path)),
            metadata,
        })
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Renders the `source()` chain of an error, innermost last.
fn source_chain<E: StdError + ?Sized>(error: &E) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(format!("  {}: {cause}", causes.len()));
        current = cause.source();
    }

    (!causes.is_empty()).then(|| format!("Caused by:\n{}", causes.join("\n")))
}
