//! Error types for Wingman Monitor.
//!
//! Monitoring itself never surfaces errors to the host. Config and delivery
//! failures have their own types ([`ConfigError`](crate::config::ConfigError),
//! [`SenderError`](crate::sender::SenderError)); this module covers reading
//! the host project's files, whose failures are logged and swallowed.

use thiserror::Error;

/// Errors that can occur while reading host project files.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host project manifest could not be parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] toml::de::Error),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn monitor_error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MonitorError = io_err.into();
        assert!(matches!(err, MonitorError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: file not found");
    }

    #[test]
    fn monitor_error_manifest_conversion() {
        let toml_err = toml::from_str::<toml::Table>("[package").unwrap_err();
        let err: MonitorError = toml_err.into();
        assert!(matches!(err, MonitorError::Manifest(_)));
        assert!(err.to_string().starts_with("manifest error"));
    }

    #[test]
    fn io_error_is_the_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: MonitorError = io_err.into();

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "access denied");
    }
}
