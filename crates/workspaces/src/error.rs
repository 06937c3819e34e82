//! Error types for workspace operations.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during workspace discovery and manifest rewriting.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Workspace root manifest not found.
    #[error("Workspace not found at path: {path}")]
    #[diagnostic(
        code(releasekit::workspaces::workspace_not_found),
        help("Ensure the configured workspace root contains the ecosystem's root manifest")
    )]
    WorkspaceNotFound {
        /// The path that was searched.
        path: PathBuf,
    },

    /// A manifest is present but its content is unusable.
    #[error("Invalid manifest at {path}: {message}")]
    #[diagnostic(
        code(releasekit::workspaces::invalid_manifest),
        help("Check the manifest for missing required fields such as the package name")
    )]
    InvalidManifest {
        /// Path to the manifest.
        path: PathBuf,
        /// Description of what is invalid.
        message: String,
    },

    /// A manifest could not be rewritten.
    #[error("Failed to rewrite manifest: {message}")]
    #[diagnostic(code(releasekit::workspaces::manifest_edit))]
    ManifestEdit {
        /// Description of the failure.
        message: String,
    },

    /// A member, exclusion or group pattern is not a valid glob.
    #[error("Invalid pattern '{pattern}': {message}")]
    #[diagnostic(
        code(releasekit::workspaces::invalid_pattern),
        help("Patterns use glob syntax, e.g. 'packages/*' or 'plugin-*'")
    )]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        message: String,
    },

    /// A group was requested that the configuration does not declare.
    #[error("Unknown package group '{group}'")]
    #[diagnostic(
        code(releasekit::workspaces::unknown_group),
        help("Declare the group under the workspace's `groups` table")
    )]
    UnknownGroup {
        /// The requested group.
        group: String,
    },

    /// Ecosystem name not recognized.
    #[error("Unsupported ecosystem: {name}")]
    #[diagnostic(
        code(releasekit::workspaces::unsupported_ecosystem),
        help("Supported ecosystems: rust, javascript, python, go, dart")
    )]
    UnsupportedEcosystem {
        /// The unsupported name.
        name: String,
    },

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", location("at", path.as_deref()))]
    #[diagnostic(code(releasekit::workspaces::io_error))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },

    /// JSON parsing error.
    #[error("JSON parsing error{}: {source}", location("in", path.as_deref()))]
    #[diagnostic(code(releasekit::workspaces::json_error))]
    Json {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Optional path to the JSON file.
        path: Option<PathBuf>,
    },

    /// TOML parsing error.
    #[error("TOML parsing error{}: {source}", location("in", path.as_deref()))]
    #[diagnostic(code(releasekit::workspaces::toml_error))]
    Toml {
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
        /// Optional path to the TOML file.
        path: Option<PathBuf>,
    },

    /// YAML parsing error.
    #[error("YAML parsing error{}: {source}", location("in", path.as_deref()))]
    #[diagnostic(code(releasekit::workspaces::yaml_error))]
    Yaml {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
        /// Optional path to the YAML file.
        path: Option<PathBuf>,
    },
}

fn location(preposition: &str, path: Option<&Path>) -> String {
    path.map(|p| format!(" {preposition} {}", p.display()))
        .unwrap_or_default()
}

impl Error {
    /// Create a manifest edit error.
    #[must_use]
    pub fn edit(message: impl Into<String>) -> Self {
        Self::ManifestEdit {
            message: message.into(),
        }
    }

    /// Create an invalid manifest error.
    #[must_use]
    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }
}
