//! Error types for release operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during release operations.
///
/// Stage-local failures inside the publish pipeline are captured in a
/// `PublishResult` instead; these variants abort an operation.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration error. Always raised before any side effect.
    #[error("Release configuration error: {message}")]
    #[diagnostic(code(releasekit::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Dependency graph error, such as a cycle.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] releasekit_graph::Error),

    /// Workspace discovery or manifest rewriting error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workspace(#[from] releasekit_workspaces::Error),

    /// Failed to read or write a changeset file.
    #[error("Changeset I/O error: {message}")]
    #[diagnostic(
        code(releasekit::release::changeset_io),
        help("Check that the changeset directory exists and is writable")
    )]
    ChangesetIo {
        /// The error message
        message: String,
        /// The path that caused the error
        path: Option<PathBuf>,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to parse a changeset file.
    #[error("Invalid changeset format: {message}")]
    #[diagnostic(
        code(releasekit::release::changeset_parse),
        help("Changesets are Markdown with a `---` frontmatter of `\"package\": bump` lines")
    )]
    ChangesetParse {
        /// The error message
        message: String,
        /// The path to the invalid file
        path: Option<PathBuf>,
    },

    /// Failed to parse a version under its scheme.
    #[error("Invalid {scheme} version: {version}")]
    #[diagnostic(
        code(releasekit::release::invalid_version),
        help("Check the package's declared version and its `versioning_scheme`")
    )]
    InvalidVersion {
        /// The invalid version string
        version: String,
        /// The scheme it was parsed under
        scheme: String,
    },

    /// A computed version would not move forward.
    #[error("Next version {new} of {package} is not greater than {current}")]
    #[diagnostic(
        code(releasekit::release::version_not_increasing),
        help("Check the prerelease label or the CalVer format against the current version")
    )]
    VersionNotIncreasing {
        /// Package name
        package: String,
        /// Current version
        current: String,
        /// Proposed version
        new: String,
    },

    /// Package not found in the workspace.
    #[error("Package not found: {name}")]
    #[diagnostic(code(releasekit::release::package_not_found))]
    PackageNotFound {
        /// The package name that wasn't found
        name: String,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(releasekit::release::git),
        help("Ensure you are in a git repository and have the necessary permissions")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// Backend error (forge, registry, package manager).
    #[error("{backend} backend error: {message}")]
    #[diagnostic(code(releasekit::release::backend))]
    Backend {
        /// The backend that failed
        backend: String,
        /// The error message
        message: String,
    },

    /// A subprocess could not be started.
    #[error("Failed to run `{program}`: {message}")]
    #[diagnostic(
        code(releasekit::release::command),
        help("Ensure the tool is installed and on PATH")
    )]
    Command {
        /// Program name
        program: String,
        /// The error message
        message: String,
    },

    /// An operation exceeded its configured timeout.
    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(code(releasekit::release::timeout))]
    Timeout {
        /// Operation name
        operation: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// Published content does not match the local artifact. Never retried.
    #[error("Checksum mismatch for {package} ({file}): local {local}, registry {remote}")]
    #[diagnostic(
        code(releasekit::release::checksum_mismatch),
        help(
            "The registry holds different bytes than were built; \
             investigate before yanking or republishing"
        )
    )]
    ChecksumMismatch {
        /// Package name
        package: String,
        /// Artifact file name
        file: String,
        /// Locally computed digest
        local: String,
        /// Registry-reported digest
        remote: String,
    },

    /// A restored manifest does not hash to its pre-pin content.
    #[error("Restored manifest {} does not match its backup", path.display())]
    #[diagnostic(
        code(releasekit::release::restore_mismatch),
        help("Restore the manifest from the `.releasekit-backup` file next to it")
    )]
    RestoreMismatch {
        /// Manifest path
        path: PathBuf,
    },

    /// Another release holds the workspace lock.
    #[error("Another release is running: lock {} held by {holder}", path.display())]
    #[diagnostic(
        code(releasekit::release::locked),
        help("Wait for the other run to finish; the lock is released when that process exits")
    )]
    Locked {
        /// Lock file path
        path: PathBuf,
        /// Lock holder description
        holder: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(releasekit::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(releasekit::release::json))]
    Json(#[from] serde_json::Error),

    /// Wrapped TOML parsing error.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(releasekit::release::toml_parse))]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new changeset I/O error with source.
    #[must_use]
    pub fn changeset_io(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::ChangesetIo {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    /// Create a new changeset parse error.
    #[must_use]
    pub fn changeset_parse(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::ChangesetParse {
            message: message.into(),
            path,
        }
    }

    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            scheme: scheme.into(),
        }
    }

    /// Create a new package not found error.
    #[must_use]
    pub fn package_not_found(name: impl Into<String>) -> Self {
        Self::PackageNotFound { name: name.into() }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a new backend error.
    #[must_use]
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a new command error.
    #[must_use]
    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the operation may succeed.
    ///
    /// Timeouts, backend and command failures are transient; verification
    /// and configuration errors are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Backend { .. } | Self::Command { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("unknown ecosystem 'cobol'", "use one of rust, python");
        assert!(err.to_string().contains("unknown ecosystem"));

        let err = Error::ChecksumMismatch {
            package: "core".into(),
            file: "core-1.0.0.crate".into(),
            local: "aa".into(),
            remote: "bb".into(),
        };
        assert!(err.to_string().contains("core-1.0.0.crate"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout { operation: "publish".into(), seconds: 5 }.is_transient());
        assert!(Error::backend("npm", "503").is_transient());
        assert!(!Error::git("bad ref").is_transient());
    }

    #[test]
    fn test_graph_error_is_transparent() {
        let err: Error = releasekit_graph::Error::CycleDetected {
            cycles: vec![vec!["a".into(), "b".into()]],
        }
        .into();
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
