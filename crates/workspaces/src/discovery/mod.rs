//! Per-ecosystem workspace backends.
//!
//! Each backend discovers the packages of one ecosystem under a workspace
//! root and knows how to rewrite that ecosystem's manifest format:
//! - `Cargo.toml` (Rust)
//! - `package.json` / `pnpm-workspace.yaml` (JavaScript)
//! - `pyproject.toml` with `[tool.uv.workspace]` (Python)
//! - `go.work` / `go.mod` (Go)
//! - `pubspec.yaml` with `workspace:` (Dart)

use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use glob::Pattern;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod cargo;
pub mod dart;
pub mod go;
pub mod javascript;
pub mod python;

pub use cargo::CargoWorkspace;
pub use dart::DartWorkspace;
pub use go::GoWorkspace;
pub use javascript::JavaScriptWorkspace;
pub use python::PythonWorkspace;

/// Discovers packages and rewrites manifests for one ecosystem.
///
/// Rewriting methods are pure string transforms so callers decide when
/// and how files are written (and restored).
pub trait WorkspaceBackend: Send + Sync {
    /// Ecosystem handled by this backend.
    fn ecosystem(&self) -> Ecosystem;

    /// Discover every package under `root`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the root manifest is missing or unreadable.
    fn discover(&self, root: &Path) -> Result<Vec<Package>>;

    /// Rewrite internal dependency references in `manifest` to the exact
    /// versions in `pins` (package name to version).
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be parsed.
    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String>;

    /// Rewrite the package's own version in the content of its version file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the version is not
    /// declared in it.
    fn set_version(&self, content: &str, version: &str) -> Result<String>;

    /// File holding the package's version. Defaults to the manifest.
    fn version_file(&self, package: &Package) -> PathBuf {
        package.manifest_path.clone()
    }
}

/// Returns the workspace backend for an ecosystem.
#[must_use]
pub fn backend_for(ecosystem: Ecosystem) -> Box<dyn WorkspaceBackend> {
    match ecosystem {
        Ecosystem::Rust => Box::new(CargoWorkspace),
        Ecosystem::JavaScript => Box::new(JavaScriptWorkspace),
        Ecosystem::Python => Box::new(PythonWorkspace),
        Ecosystem::Go => Box::new(GoWorkspace),
        Ecosystem::Dart => Box::new(DartWorkspace),
    }
}

/// Resolves glob patterns to member directories, handling exclusions.
///
/// Patterns starting with `!` are treated as exclusions. The result is a
/// sorted list of unique absolute paths under `root`. Heavy directories
/// (`node_modules`, `.git`, `target`, `dist`, `.venv`) are never entered.
///
/// # Errors
///
/// Returns [`Error::InvalidPattern`] for an invalid glob.
pub fn resolve_glob_patterns(
    root: &Path,
    patterns: &[String],
    exclusions: &[String],
) -> Result<Vec<PathBuf>> {
    let mut inclusion_patterns = Vec::new();
    let mut exclusion_patterns = Vec::new();

    for p in exclusions {
        exclusion_patterns.push(compile(p)?);
    }
    for p in patterns {
        let p = p.trim_start_matches("./");
        if let Some(stripped) = p.strip_prefix('!') {
            exclusion_patterns.push(compile(stripped.trim_start_matches("./"))?);
        } else {
            inclusion_patterns.push(compile(p.trim_end_matches('/'))?);
        }
    }

    let mut matched_paths = HashSet::new();
    let walker = WalkDir::new(root).follow_links(false);

    for entry in walker
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_str().unwrap_or("");
            !matches!(name, "node_modules" | ".git" | "target" | "dist" | ".venv")
        })
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let Ok(rel_path) = path.strip_prefix(root) else {
            continue;
        };

        let is_root = rel_path.as_os_str().is_empty();
        let matches = |pattern: &Pattern| {
            if is_root {
                pattern.as_str() == "." || pattern.as_str().is_empty()
            } else {
                pattern.matches_path(rel_path)
            }
        };

        if exclusion_patterns.iter().any(&matches) {
            continue;
        }
        if inclusion_patterns.iter().any(&matches) {
            matched_paths.insert(path.to_path_buf());
        }
    }

    let mut result: Vec<PathBuf> = matched_paths.into_iter().collect();
    result.sort();
    Ok(result)
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Reads a file into a string.
///
/// # Errors
///
/// Returns [`Error::Io`] with the path attached.
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Io {
        source: e,
        path: Some(path.to_path_buf()),
        operation: "reading manifest".to_string(),
    })
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as valid JSON.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| Error::Json {
        source: e,
        path: Some(path.to_path_buf()),
    })
}

/// Reads and parses a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as valid TOML.
pub fn read_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    toml::from_str(&content).map_err(|e| Error::Toml {
        source: e,
        path: Some(path.to_path_buf()),
    })
}

/// Reads and parses a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as valid YAML.
pub fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    serde_yaml::from_str(&content).map_err(|e| Error::Yaml {
        source: e,
        path: Some(path.to_path_buf()),
    })
}

/// Path of `dir` relative to `root`, or `dir` itself when it is outside.
pub(crate) fn relative_to(root: &Path, dir: &Path) -> PathBuf {
    dir.strip_prefix(root).unwrap_or(dir).to_path_buf()
}

/// Keep only dependencies naming other discovered packages, then sort.
pub(crate) fn finalize(mut packages: Vec<Package>) -> Vec<Package> {
    let names: HashSet<String> = packages.iter().map(|p| p.name.clone()).collect();
    for package in &mut packages {
        let own = package.name.clone();
        package
            .dependencies
            .retain(|dep| dep != &own && names.contains(dep));
    }
    packages.sort_by(|a, b| a.name.cmp(&b.name));
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, dirs: &[&str]) {
        for dir in dirs {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
    }

    #[test]
    fn test_resolve_glob_patterns_with_exclusions() {
        let temp = TempDir::new().unwrap();
        mkdirs(
            temp.path(),
            &["packages/a", "packages/b", "packages/excluded", "packages/a/node_modules/x"],
        );

        let found = resolve_glob_patterns(
            temp.path(),
            &["packages/*".to_string(), "!packages/excluded".to_string()],
            &[],
        )
        .unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("packages/a"), PathBuf::from("packages/b")]);
    }

    #[test]
    fn test_resolve_glob_patterns_dot_slash_prefix() {
        let temp = TempDir::new().unwrap();
        mkdirs(temp.path(), &["libs/core"]);

        let found = resolve_glob_patterns(temp.path(), &["./libs/core".to_string()], &[]).unwrap();
        assert_eq!(found, vec![temp.path().join("libs/core")]);
    }

    #[test]
    fn test_resolve_glob_patterns_root_member() {
        let temp = TempDir::new().unwrap();
        let found = resolve_glob_patterns(temp.path(), &[".".to_string()], &[]).unwrap();
        assert_eq!(found, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = resolve_glob_patterns(temp.path(), &["packages/[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_finalize_drops_external_and_self_dependencies() {
        let packages = vec![
            Package::new("b", "1.0.0", "b", "/b", Ecosystem::Rust)
                .with_dependency("a")
                .with_dependency("serde")
                .with_dependency("b"),
            Package::new("a", "1.0.0", "a", "/a", Ecosystem::Rust),
        ];
        let packages = finalize(packages);
        assert_eq!(packages[0].name, "a");
        assert_eq!(packages[1].dependencies.iter().collect::<Vec<_>>(), vec!["a"]);
    }
}
