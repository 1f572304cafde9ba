//! Runtime environment classification.
//!
//! Reporting policy depends on whether the host runs in development or
//! production. The classification is read through an [`EnvironmentProbe`] so
//! hosts and tests can supply it without touching process state.

use std::env;
use std::fmt;

/// Primary environment variable consulted by [`ProcessEnvironment`].
pub const ENV_RUNTIME: &str = "WINGMAN_ENV";

/// Fallback environment variable consulted by [`ProcessEnvironment`].
pub const ENV_RUNTIME_FALLBACK: &str = "APP_ENV";

/// API endpoint used in production.
pub const PRODUCTION_API_ENDPOINT: &str = "https://api.wingman.dev";

/// API endpoint used everywhere else.
pub const DEVELOPMENT_API_ENDPOINT: &str = "http://localhost:3000";

/// Coarse classification of the runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Development,
    Production,
    /// Anything else, including an unset variable (e.g. `test`, `staging`).
    Other,
}

impl RuntimeEnvironment {
    /// Classifies an environment label, case-insensitively.
    #[must_use]
    pub fn classify(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Source of the runtime environment classification.
pub trait EnvironmentProbe: Send + Sync {
    fn environment(&self) -> RuntimeEnvironment;
}

/// Reads `WINGMAN_ENV`, then `APP_ENV`. Unset means [`RuntimeEnvironment::Other`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentProbe for ProcessEnvironment {
    fn environment(&self) -> RuntimeEnvironment {
        env::var(ENV_RUNTIME)
            .or_else(|_| env::var(ENV_RUNTIME_FALLBACK))
            .map(|label| RuntimeEnvironment::classify(&label))
            .unwrap_or(RuntimeEnvironment::Other)
    }
}

/// A probe that always answers with the same classification.
#[derive(Debug, Clone, Copy)]
pub struct StaticEnvironment(pub RuntimeEnvironment);

impl EnvironmentProbe for StaticEnvironment {
    fn environment(&self) -> RuntimeEnvironment {
        self.0
    }
}

/// Feature switches derived from the runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub enable_error_reporting: bool,
    pub enable_performance_monitoring: bool,
    pub enable_debug_logs: bool,
    pub api_endpoint: String,
}

/// Derives the [`EnvironmentConfig`] for the environment reported by `probe`.
#[must_use]
pub fn environment_config(probe: &dyn EnvironmentProbe) -> EnvironmentConfig {
    let environment = probe.environment();
    let production = environment.is_production();

    EnvironmentConfig {
        enable_error_reporting: production,
        enable_performance_monitoring: production,
        enable_debug_logs: environment.is_development(),
        api_endpoint: if production {
            PRODUCTION_API_ENDPOINT
        } else {
            DEVELOPMENT_API_ENDPOINT
        }
        .to_string(),
    }
}
