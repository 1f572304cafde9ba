//! Global error hooks and their installation record.
//!
//! Two kinds of hook slots exist:
//!
//! - The process panic hook, which is global to the process.
//! - A [`HostSurface`], an error-dispatch surface owned by an embedding host
//!   (an event loop, a GUI shell, a plugin runtime). The host routes its
//!   uncaught errors and unhandled rejections through the surface's slots.
//!
//! Installing a hook saves whatever occupied the slot before and chains to
//! it; uninstalling puts the saved handler back. Only one installer at a time
//! is supported per slot.

use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

/// Handler for error events. The return value is handed back to the host
/// (for example `true` to mark the error as handled).
pub type ErrorHandler = Arc<dyn Fn(&ErrorEvent) -> bool + Send + Sync>;

/// Handler for unhandled rejections.
pub type RejectionHandler = Arc<dyn Fn(&RejectionEvent) + Send + Sync>;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// An uncaught error reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
    /// Script, module or file the error originated from.
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub stack: Option<String>,
    /// HTTP status, when the error came from a request.
    pub status: Option<u16>,
}

impl ErrorEvent {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// `source:line:column`, as far as known.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        let source = self.source.as_deref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(column)) => format!("{source}:{line}:{column}"),
            (Some(line), None) => format!("{source}:{line}"),
            _ => source.to_string(),
        })
    }
}

/// An asynchronous failure nobody handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionEvent {
    pub reason: String,
    pub stack: Option<String>,
    pub status: Option<u16>,
    /// The underlying request was aborted by the client.
    pub aborted: bool,
}

impl RejectionEvent {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Self::default()
        }
    }
}

/// Error-dispatch slots owned by an embedding host.
///
/// The host creates one surface, hands an `Arc` of it to the monitor, and
/// calls [`dispatch_error`](Self::dispatch_error) /
/// [`dispatch_unhandled_rejection`](Self::dispatch_unhandled_rejection) for
/// every uncaught failure.
pub struct HostSurface {
    url: Option<String>,
    user_agent: Option<String>,
    on_error: RwLock<Option<ErrorHandler>>,
    on_unhandled_rejection: RwLock<Option<RejectionHandler>>,
}

impl fmt::Debug for HostSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSurface")
            .field("url", &self.url)
            .field("user_agent", &self.user_agent)
            .field("on_error", &self.on_error().is_some())
            .field(
                "on_unhandled_rejection",
                &self.on_unhandled_rejection().is_some(),
            )
            .finish()
    }
}

impl Default for HostSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSurface {
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: None,
            user_agent: None,
            on_error: RwLock::new(None),
            on_unhandled_rejection: RwLock::new(None),
        }
    }

    /// Sets the URL (page, route, endpoint) attached to report context.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the user agent attached to report context.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Current error handler.
    #[must_use]
    pub fn on_error(&self) -> Option<ErrorHandler> {
        self.on_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the error handler, returning the previous one.
    pub fn set_on_error(&self, handler: Option<ErrorHandler>) -> Option<ErrorHandler> {
        let mut slot = self.on_error.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, handler)
    }

    /// Current unhandled-rejection handler.
    #[must_use]
    pub fn on_unhandled_rejection(&self) -> Option<RejectionHandler> {
        self.on_unhandled_rejection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the unhandled-rejection handler, returning the previous one.
    pub fn set_on_unhandled_rejection(
        &self,
        handler: Option<RejectionHandler>,
    ) -> Option<RejectionHandler> {
        let mut slot = self
            .on_unhandled_rejection
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, handler)
    }

    /// Routes an uncaught error through the installed handler.
    ///
    /// Returns the handler's return value, or `false` without a handler.
    pub fn dispatch_error(&self, event: &ErrorEvent) -> bool {
        // Clone out of the lock so handlers may touch the slots themselves.
        self.on_error().is_some_and(|handler| handler(event))
    }

    /// Routes an unhandled rejection through the installed handler.
    pub fn dispatch_unhandled_rejection(&self, event: &RejectionEvent) {
        if let Some(handler) = self.on_unhandled_rejection() {
            handler(event);
        }
    }
}

/// The panic hook that was active before ours.
pub(crate) struct PanicHookGuard {
    previous: Arc<PanicHook>,
}

impl PanicHookGuard {
    fn restore(self) {
        // The panic hook cannot be swapped from a panicking thread.
        if thread::panicking() {
            return;
        }
        let previous = self.previous;
        drop(panic::take_hook());
        panic::set_hook(Box::new(move |info| previous(info)));
    }
}

/// Installs `on_panic` as the panic hook, chaining to the previous hook.
pub(crate) fn install_panic_hook<F>(on_panic: F) -> PanicHookGuard
where
    F: Fn(&PanicHookInfo<'_>) + Send + Sync + 'static,
{
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    let chained = Arc::clone(&previous);

    panic::set_hook(Box::new(move |info| {
        on_panic(info);
        chained(info);
    }));

    PanicHookGuard { previous }
}

/// Handlers that occupied a [`HostSurface`] before ours.
pub(crate) struct SurfaceHooks {
    surface: Arc<HostSurface>,
    previous_error: Option<ErrorHandler>,
    previous_rejection: Option<RejectionHandler>,
}

impl SurfaceHooks {
    fn restore(self) {
        self.surface.set_on_error(self.previous_error);
        self.surface
            .set_on_unhandled_rejection(self.previous_rejection);
    }
}

/// Installs handlers on `surface` that run `on_error` / `on_rejection` and
/// then chain to whatever was installed before.
pub(crate) fn install_surface_hooks<E, R>(
    surface: &Arc<HostSurface>,
    on_error: E,
    on_rejection: R,
) -> SurfaceHooks
where
    E: Fn(&ErrorEvent) + Send + Sync + 'static,
    R: Fn(&RejectionEvent) + Send + Sync + 'static,
{
    let previous_error = surface.on_error();
    let previous_rejection = surface.on_unhandled_rejection();

    let chained_error = previous_error.clone();
    surface.set_on_error(Some(Arc::new(move |event: &ErrorEvent| {
        on_error(event);
        chained_error.as_ref().is_some_and(|previous| previous(event))
    })));

    let chained_rejection = previous_rejection.clone();
    surface.set_on_unhandled_rejection(Some(Arc::new(move |event: &RejectionEvent| {
        on_rejection(event);
        if let Some(previous) = &chained_rejection {
            previous(event);
        }
    })));

    SurfaceHooks {
        surface: Arc::clone(surface),
        previous_error,
        previous_rejection,
    }
}

/// Everything a started monitor has installed.
#[derive(Default)]
pub(crate) struct InstalledHooks {
    pub(crate) panic: Option<PanicHookGuard>,
    pub(crate) surface: Option<SurfaceHooks>,
    /// Errors from tasks spawned via `Monitor::spawn_tracked` are reported.
    pub(crate) tracked_tasks: bool,
}

impl InstalledHooks {
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.panic.is_none() && self.surface.is_none() && !self.tracked_tasks
    }

    /// Restores every saved handler.
    pub(crate) fn uninstall(&mut self) {
        if let Some(panic) = self.panic.take() {
            panic.restore();
        }
        if let Some(surface) = self.surface.take() {
            surface.restore();
        }
        self.tracked_tasks = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_without_handler_returns_false() {
        let surface = HostSurface::new();
        assert!(!surface.dispatch_error(&ErrorEvent::new("boom")));
        surface.dispatch_unhandled_rejection(&RejectionEvent::new("nope"));
    }

    #[test]
    fn error_event_location() {
        let mut event = ErrorEvent::new("boom");
        assert_eq!(event.location(), None);

        event.source = Some("app.js".to_string());
        assert_eq!(event.location().as_deref(), Some("app.js"));

        event.line = Some(10);
        event.column = Some(4);
        assert_eq!(event.location().as_deref(), Some("app.js:10:4"));
    }

    #[test]
    fn surface_hooks_chain_and_preserve_return_value() {
        let surface = Arc::new(HostSurface::new());
        let previous_calls = Arc::new(AtomicUsize::new(0));
        let ours = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&previous_calls);
        surface.set_on_error(Some(Arc::new(move |_: &ErrorEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })));

        let ours_error = Arc::clone(&ours);
        let ours_rejection = Arc::clone(&ours);
        let mut hooks = InstalledHooks {
            surface: Some(install_surface_hooks(
                &surface,
                move |_| {
                    ours_error.fetch_add(1, Ordering::SeqCst);
                },
                move |_| {
                    ours_rejection.fetch_add(1, Ordering::SeqCst);
                },
            )),
            ..InstalledHooks::default()
        };

        assert!(surface.dispatch_error(&ErrorEvent::new("boom")));
        surface.dispatch_unhandled_rejection(&RejectionEvent::new("nope"));
        assert_eq!(previous_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ours.load(Ordering::SeqCst), 2);

        hooks.uninstall();
        assert!(hooks.is_empty());
        assert!(surface.on_unhandled_rejection().is_none());
        assert!(surface.dispatch_error(&ErrorEvent::new("again")));
        assert_eq!(previous_calls.load(Ordering::SeqCst), 2);
        assert_eq!(ours.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn surface_hooks_without_previous_handler_return_false() {
        let surface = Arc::new(HostSurface::new());
        let hooks = install_surface_hooks(&surface, |_| {}, |_| {});

        assert!(!surface.dispatch_error(&ErrorEvent::new("boom")));

        hooks.restore();
        assert!(surface.on_error().is_none());
    }

    #[test]
    fn uninstall_on_empty_record_is_noop() {
        let mut hooks = InstalledHooks::default();
        assert!(hooks.is_empty());
        hooks.uninstall();
        assert!(hooks.is_empty());
    }
}
