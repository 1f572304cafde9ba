//! Reporting policy for captured errors.
//!
//! [`should_report`] decides whether a captured error is worth a report. The
//! rules are evaluated in order and the first match wins:
//!
//! 1. Never report in development.
//! 2. Drop errors raised by browser extensions.
//! 3. Drop failed fetches with a zero or aborted status (client network issues).
//! 4. Drop the ad-blocker script-loading error.
//! 5. Report everything else.

use crate::environment::EnvironmentProbe;

/// URL schemes identifying code injected by browser extensions.
const EXTENSION_MARKERS: &[&str] = &["chrome-extension://", "moz-extension://"];

/// Messages produced by a fetch that never reached the server.
const FAILED_FETCH_MARKERS: &[&str] = &[
    "Failed to fetch",
    "NetworkError when attempting to fetch resource",
    "Load failed",
];

/// Error raised when an ad blocker refuses to load a script.
const AD_BLOCKER_MARKER: &str = "net::ERR_BLOCKED_BY_CLIENT";

/// The part of a captured error the filter looks at.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

/// Circumstances surrounding a captured error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterContext {
    /// HTTP status of the request that failed, if any.
    pub status: Option<u16>,
    /// Whether the request was aborted by the client.
    pub aborted: bool,
}

impl FilterContext {
    fn is_client_side_network_failure(&self) -> bool {
        self.aborted || self.status == Some(0)
    }
}

/// Decides whether an automatically captured error is forwarded.
///
/// # Arguments
///
/// * `error` - Message and stack of the captured error
/// * `context` - Request status and abort flag, when the error came from a request
/// * `probe` - Source of the runtime environment
///
/// # Returns
///
/// `false` in development and for browser-extension, client-side network
/// and ad-blocker noise; `true` otherwise.
#[must_use]
pub fn should_report(
    error: &ErrorInfo,
    context: &FilterContext,
    probe: &dyn EnvironmentProbe,
) -> bool {
    if probe.environment().is_development() {
        return false;
    }

    let message = error.message.as_str();

    if EXTENSION_MARKERS.iter().any(|m| message.contains(m)) {
        return false;
    }

    if FAILED_FETCH_MARKERS.iter().any(|m| message.contains(m))
        && context.is_client_side_network_failure()
    {
        return false;
    }

    message != AD_BLOCKER_MARKER
}
