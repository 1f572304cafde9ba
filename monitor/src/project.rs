//! Host project metadata.
//!
//! Reports carry the name, version and URL of the project they came from,
//! read from the `[package]` table of the project's `Cargo.toml`.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::types::ProjectInfo;

/// Manifest file read from the project root.
pub const MANIFEST_FILE_NAME: &str = "Cargo.toml";

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: Option<String>,
    // Workspace-inherited values (`version.workspace = true`) are tables.
    version: Option<toml::Value>,
    homepage: Option<String>,
    repository: Option<toml::Value>,
}

/// Reads the project metadata, returning an empty [`ProjectInfo`] on any failure.
#[must_use]
pub fn project_info(project_path: &Path) -> ProjectInfo {
    read_manifest(project_path).unwrap_or_else(|e| {
        debug!(error = %e, "Project metadata unavailable");
        ProjectInfo::default()
    })
}

fn read_manifest(project_path: &Path) -> Result<ProjectInfo> {
    let contents = fs::read_to_string(project_path.join(MANIFEST_FILE_NAME))?;
    let manifest: Manifest = toml::from_str(&contents)?;

    let Some(package) = manifest.package else {
        return Ok(ProjectInfo::default());
    };

    let repository = package.repository.and_then(string_value);
    Ok(ProjectInfo {
        name: package.name,
        version: package.version.and_then(string_value),
        url: package.homepage.or(repository),
    })
}

fn string_value(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        _ => None,
    }
}
