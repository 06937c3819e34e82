//! Core workspace types.

use crate::error::{Error, Result};
use releasekit_graph::PackageNodeData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A language ecosystem with its own manifests, registry and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Cargo workspaces published to crates.io.
    Rust,
    /// npm / pnpm workspaces published to the npm registry.
    #[serde(alias = "js", alias = "node")]
    JavaScript,
    /// uv workspaces published to PyPI.
    Python,
    /// `go.work` module sets resolved through the Go module proxy.
    Go,
    /// Dart pub workspaces published to pub.dev.
    Dart,
}

impl Ecosystem {
    /// All supported ecosystems.
    pub const ALL: [Self; 5] = [
        Self::Rust,
        Self::JavaScript,
        Self::Python,
        Self::Go,
        Self::Dart,
    ];

    /// Lowercase identifier used in configuration and tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Dart => "dart",
        }
    }

    /// Name of the per-package manifest file.
    #[must_use]
    pub const fn manifest_file(self) -> &'static str {
        match self {
            Self::Rust => "Cargo.toml",
            Self::JavaScript => "package.json",
            Self::Python => "pyproject.toml",
            Self::Go => "go.mod",
            Self::Dart => "pubspec.yaml",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "cargo" => Ok(Self::Rust),
            "javascript" | "js" | "node" | "typescript" => Ok(Self::JavaScript),
            "python" | "py" => Ok(Self::Python),
            "go" | "golang" => Ok(Self::Go),
            "dart" | "flutter" => Ok(Self::Dart),
            _ => Err(Error::UnsupportedEcosystem {
                name: s.to_string(),
            }),
        }
    }
}

/// A publishable unit discovered in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name, unique within its ecosystem.
    pub name: String,
    /// Current version as declared in the manifest.
    pub version: String,
    /// Directory relative to the workspace root.
    pub path: PathBuf,
    /// Absolute path of the manifest file.
    pub manifest_path: PathBuf,
    /// Ecosystem the package belongs to.
    pub ecosystem: Ecosystem,
    /// Names of other workspace packages this one depends on.
    pub dependencies: BTreeSet<String>,
    /// Named groups the package belongs to.
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Whether the package is ever published to a registry.
    #[serde(default = "default_publishable")]
    pub publishable: bool,
}

const fn default_publishable() -> bool {
    true
}

impl Package {
    /// Create a publishable package with no dependencies or groups.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        ecosystem: Ecosystem,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: path.into(),
            manifest_path: manifest_path.into(),
            ecosystem,
            dependencies: BTreeSet::new(),
            groups: BTreeSet::new(),
            publishable: true,
        }
    }

    /// Add a dependency name.
    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.insert(name.into());
        self
    }

    /// Add a group tag.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }
}

impl PackageNodeData for Package {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }
}
