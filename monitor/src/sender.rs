//! HTTP sender for Wingman Monitor.
//!
//! Delivers error reports to the configured webhook with:
//!
//! - Connection pooling via reqwest
//! - Bearer token authorization taken from the report
//! - A per-request timeout (5 seconds by default)
//!
//! Delivery is at-most-once: a report is posted a single time, and a failed
//! post is logged and dropped. There is no retry, queue or batching.
//!
//! [`Sender::deliver_blocking`] serves callers that cannot rely on a tokio
//! runtime surviving, such as a panic hook on the thread driving `block_on`.
//!
//! # Example
//!
//! ```no_run
//! use wingman_monitor::sender::{Sender, SenderConfig};
//! # use wingman_monitor::types::ErrorReport;
//!
//! # async fn example(report: ErrorReport) {
//! let sender = Sender::new(SenderConfig::new(
//!     "https://hooks.example.com/errors".to_string(),
//! ));
//! sender.report_error(&report).await;
//! # }
//! ```

use std::thread;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ErrorReport, WebhookEnvelope};

/// Request timeout used by the monitor.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// `User-Agent` sent with every request.
pub const MONITOR_USER_AGENT: &str = "Wingman-Monitor/1.0.0";

/// Name of the thread running a blocking delivery.
pub(crate) const DELIVERY_THREAD_NAME: &str = "wingman-delivery";

/// Errors that can occur while posting a report.
#[derive(Error, Debug)]
pub enum SenderError {
    /// HTTP request failed (connection, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with a non-2xx status.
    #[error("webhook returned {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The access token contains characters not allowed in a header.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The thread or runtime for a blocking delivery could not be created.
    #[error("failed to start blocking delivery: {0}")]
    Runtime(#[from] std::io::Error),

    /// The thread running a blocking delivery panicked.
    #[error("delivery thread panicked")]
    ThreadPanicked,
}

/// Configuration for the sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Webhook URL receiving reports.
    pub webhook_url: String,

    /// Timeout applied to each request.
    pub timeout: Duration,
}

impl SenderConfig {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Posts error reports to a webhook.
#[derive(Debug, Clone)]
pub struct Sender {
    config: SenderConfig,
    client: Client,
}

impl Sender {
    /// Creates a new sender with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Webhook URL and request timeout
    #[must_use]
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Webhook URL reports are posted to.
    #[must_use]
    pub fn webhook_url(&self) -> &str {
        &self.config.webhook_url
    }

    /// Posts `report` once, logging and swallowing any failure.
    ///
    /// # Arguments
    ///
    /// * `report` - The report to deliver
    ///
    /// # Returns
    ///
    /// `true` if the webhook accepted the report.
    pub async fn report_error(&self, report: &ErrorReport) -> bool {
        let result = self.deliver(report).await;
        self.log_outcome(report, result)
    }

    fn log_outcome(&self, report: &ErrorReport, result: Result<(), SenderError>) -> bool {
        match result {
            Ok(()) => {
                debug!(
                    error_type = ?report.error_type,
                    "Error report delivered"
                );
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    error_type = ?report.error_type,
                    url = %self.config.webhook_url,
                    "Failed to deliver error report"
                );
                false
            }
        }
    }

    /// Posts `report` once.
    ///
    /// # Arguments
    ///
    /// * `report` - The report to deliver; its token becomes the bearer credential
    ///
    /// # Errors
    ///
    /// Returns `SenderError` on transport failure, timeout or a non-2xx status.
    pub async fn deliver(&self, report: &ErrorReport) -> Result<(), SenderError> {
        let body = serde_json::to_string(&WebhookEnvelope::new(report))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(MONITOR_USER_AGENT));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", report.access_token))?,
        );

        debug!(url = %self.config.webhook_url, "Sending error report");

        let response = self
            .client
            .post(&self.config.webhook_url)
            .headers(headers)
            .timeout(self.config.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(SenderError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Posts `report` once and blocks the calling thread until the attempt
    /// finishes or times out.
    ///
    /// The request runs on a dedicated thread with its own current-thread
    /// runtime and a fresh client, so it works from inside a runtime context
    /// and does not depend on the caller's runtime making progress.
    ///
    /// # Errors
    ///
    /// Returns `SenderError` when the runtime cannot be created, the
    /// delivery thread panics, or [`deliver`](Self::deliver) fails.
    pub fn deliver_blocking(&self, report: &ErrorReport) -> Result<(), SenderError> {
        // Pooled connections are driven by the runtime that opened them.
        let sender = Self::new(self.config.clone());

        let outcome = thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name(DELIVERY_THREAD_NAME.to_string())
                .spawn_scoped(scope, || -> Result<(), SenderError> {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()?;
                    runtime.block_on(sender.deliver(report))
                })?;
            Ok::<_, SenderError>(handle.join())
        })?;

        outcome.map_err(|_| SenderError::ThreadPanicked)?
    }

    /// Blocking counterpart of [`report_error`](Self::report_error).
    ///
    /// # Returns
    ///
    /// `true` if the webhook accepted the report.
    pub fn report_error_blocking(&self, report: &ErrorReport) -> bool {
        let result = self.deliver_blocking(report);
        self.log_outcome(report, result)
    }
}
