//! Report types for Wingman error monitoring.
//!
//! This module defines the error report schema and the webhook envelope it
//! travels in. Field names serialize to camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name carried by every webhook envelope.
pub const ENVELOPE_EVENT: &str = "error.runtime";

/// Source identifier carried by every webhook envelope.
pub const ENVELOPE_SOURCE: &str = "wingman-monitor";

/// Which hook captured the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    /// A panic reached the process panic hook.
    UncaughtException,
    /// A tracked background task finished with an error.
    UnhandledRejection,
    /// The host surface dispatched an error event.
    WindowError,
    /// The host surface dispatched an unhandled rejection.
    WindowUnhandledRejection,
    /// An error-level log line that looks like an error.
    ConsoleError,
    /// Reported explicitly by the host.
    CustomError,
}

impl ErrorType {
    /// Fixed severity attached to reports of this type.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::UncaughtException => Severity::Critical,
            Self::UnhandledRejection | Self::WindowUnhandledRejection => Severity::High,
            Self::WindowError | Self::CustomError => Severity::Medium,
            Self::ConsoleError => Severity::Low,
        }
    }
}

/// How bad the error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Metadata of the host project, read from its manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A single error report.
///
/// Built once per captured error and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Enriched, self-contained diagnostic message.
    pub message: String,

    pub error_type: ErrorType,

    pub severity: Severity,

    /// Environment label from the project config.
    pub environment: String,

    /// Bearer credential from the project config.
    pub access_token: String,

    /// When the error was captured, serialized as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_info: Option<ProjectInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Wrapper posted to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEnvelope<'a> {
    pub event: &'static str,
    pub data: &'a ErrorReport,
    pub timestamp: DateTime<Utc>,
    pub source: &'static str,
}

impl<'a> WebhookEnvelope<'a> {
    /// Wraps `report`, stamped with the current time.
    #[must_use]
    pub fn new(report: &'a ErrorReport) -> Self {
        Self {
            event: ENVELOPE_EVENT,
            data: report,
            timestamp: Utc::now(),
            source: ENVELOPE_SOURCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ErrorReport {
        ErrorReport {
            message: "boom".to_string(),
            error_type: ErrorType::UncaughtException,
            severity: Severity::Critical,
            environment: "production".to_string(),
            access_token: "tok".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            stack: None,
            project_info: Some(ProjectInfo::default()),
            metadata: None,
        }
    }

    #[test]
    fn error_type_serializes_to_camel_case() {
        let cases = [
            (ErrorType::UncaughtException, "uncaughtException"),
            (ErrorType::UnhandledRejection, "unhandledRejection"),
            (ErrorType::WindowError, "windowError"),
            (ErrorType::WindowUnhandledRejection, "windowUnhandledRejection"),
            (ErrorType::ConsoleError, "consoleError"),
            (ErrorType::CustomError, "customError"),
        ];
        for (error_type, expected) in cases {
            assert_eq!(
                serde_json::to_value(error_type).unwrap(),
                Value::String(expected.to_string())
            );
        }
    }

    #[test]
    fn severity_follows_trigger_table() {
        assert_eq!(ErrorType::UncaughtException.severity(), Severity::Critical);
        assert_eq!(ErrorType::UnhandledRejection.severity(), Severity::High);
        assert_eq!(ErrorType::WindowError.severity(), Severity::Medium);
        assert_eq!(ErrorType::WindowUnhandledRejection.severity(), Severity::High);
        assert_eq!(ErrorType::ConsoleError.severity(), Severity::Low);
        assert_eq!(ErrorType::CustomError.severity(), Severity::Medium);
    }

    #[test]
    fn report_timestamp_is_epoch_millis() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(json["errorType"], "uncaughtException");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["accessToken"], "tok");
        assert!(json.get("stack").is_none());
        assert_eq!(json["projectInfo"], serde_json::json!({}));
    }

    #[test]
    fn envelope_wraps_report() {
        let report = sample_report();
        let json = serde_json::to_value(WebhookEnvelope::new(&report)).unwrap();

        assert_eq!(json["event"], ENVELOPE_EVENT);
        assert_eq!(json["source"], ENVELOPE_SOURCE);
        assert_eq!(json["data"]["message"], "boom");
        assert!(json["timestamp"].is_string());
    }
}
