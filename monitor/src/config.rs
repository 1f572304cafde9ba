//! Configuration module for Wingman Monitor.
//!
//! Each monitored project carries a small JSON document, `.wingman.json`, in
//! its root directory. The [`ConfigStore`] loads, initializes and persists it.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `WINGMAN_WEBHOOK_URL` | No | `https://api.wingman.dev/webhooks/errors` | Webhook receiving error reports |
//! | `WINGMAN_ENV` | No | - | Runtime classification (`development`, `production`, ...) |
//! | `APP_ENV` | No | - | Fallback for `WINGMAN_ENV` |
//!
//! # Example
//!
//! ```no_run
//! use wingman_monitor::config::ConfigStore;
//!
//! let mut store = ConfigStore::new("/path/to/project");
//! if let Some(config) = store.load() {
//!     println!("Reporting for environment: {}", config.environment);
//! }
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the project-local configuration file.
pub const CONFIG_FILE_NAME: &str = ".wingman.json";

/// Environment variable overriding the webhook URL.
pub const ENV_WEBHOOK_URL: &str = "WINGMAN_WEBHOOK_URL";

/// Hosted webhook used when no override is configured.
pub const DEFAULT_WEBHOOK_URL: &str = "https://api.wingman.dev/webhooks/errors";

/// Errors that can occur while persisting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config document could not be serialized.
    #[error("invalid config document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Project configuration stored in `.wingman.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Token sent as the bearer credential with every report.
    pub access_token: String,

    /// Optional identifier of the project on the receiving side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Environment label copied into every report (e.g. `production`).
    pub environment: String,

    /// Root directory of the monitored project.
    pub project_path: PathBuf,

    /// Whether reporting is switched on.
    pub enabled: bool,

    /// When the config was first initialized.
    pub created_at: DateTime<Utc>,
}

/// Input for [`ConfigStore::initialize`].
#[derive(Debug, Clone, Default)]
pub struct NewConfig {
    pub access_token: String,
    pub project_id: Option<String>,
    pub environment: String,
}

/// Partial update merged by [`ConfigStore::save`]. `None` fields are left as is.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub enabled: Option<bool>,
}

impl ConfigUpdate {
    /// Update that only toggles the `enabled` flag.
    #[must_use]
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    fn apply(self, config: &mut ProjectConfig) {
        if let Some(token) = self.access_token {
            config.access_token = token;
        }
        if let Some(project_id) = self.project_id {
            config.project_id = Some(project_id);
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
    }
}

/// Loads and persists the configuration of a single project.
///
/// No concurrent writers are assumed: the store keeps the last loaded or
/// initialized document in memory and writes it back wholesale.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    project_path: PathBuf,
    config: Option<ProjectConfig>,
}

impl ConfigStore {
    /// Creates a store for the project rooted at `project_path`.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    ///
    /// # Arguments
    ///
    /// * `project_path` - Directory holding `.wingman.json`
    #[must_use]
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            config: None,
        }
    }

    /// Full path of the config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.project_path.join(CONFIG_FILE_NAME)
    }

    /// Returns the config currently held in memory.
    #[must_use]
    pub fn config(&self) -> Option<&ProjectConfig> {
        self.config.as_ref()
    }

    /// Sets the in-memory config, switched on and stamped with the current time.
    ///
    /// Nothing is written to disk; call [`save`](Self::save) to persist.
    pub fn initialize(&mut self, new: NewConfig) -> &ProjectConfig {
        self.config.insert(ProjectConfig {
            access_token: new.access_token,
            project_id: new.project_id,
            environment: new.environment,
            project_path: self.project_path.clone(),
            enabled: true,
            created_at: Utc::now(),
        })
    }

    /// Reads the config file and keeps the result in memory.
    ///
    /// Returns `None` when the file is absent or unreadable; read and parse
    /// failures are logged, never returned.
    pub fn load(&mut self) -> Option<ProjectConfig> {
        self.config = self.read();
        self.config.clone()
    }

    fn read(&self) -> Option<ProjectConfig> {
        let path = self.config_path();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file found");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file");
                return None;
            }
        };

        match serde_json::from_str::<ProjectConfig>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file");
                None
            }
        }
    }

    /// Merges `update` into the loaded config and writes it to disk.
    ///
    /// Does nothing when no config has been loaded or initialized.
    ///
    /// # Arguments
    ///
    /// * `update` - Fields to change; `None` fields keep their value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document cannot be serialized or written.
    pub fn save(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let Some(config) = self.config.as_mut() else {
            debug!("No config loaded, skipping save");
            return Ok(());
        };

        update.apply(config);

        let contents = serde_json::to_string_pretty(config)?;
        let path = self.config_path();
        fs::write(&path, contents + "\n").map_err(|source| ConfigError::Io { path, source })
    }

    /// Returns `true` if a config is loaded and switched on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.enabled)
    }
}

/// Resolves the webhook URL: explicit override, then `WINGMAN_WEBHOOK_URL`,
/// then the hosted default.
#[must_use]
pub fn resolve_webhook_url(override_url: Option<&str>) -> String {
    if let Some(url) = override_url.filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }

    env::var(ENV_WEBHOOK_URL)
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WEBHOOK_URL.to_string())
}
