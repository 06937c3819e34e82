//! Cargo workspaces via `Cargo.toml`.
//!
//! A root manifest without `[workspace]` but with `[package]` is treated as a
//! single-package workspace. Members that fail to parse are skipped with a
//! warning rather than failing discovery.

use super::{WorkspaceBackend, finalize, read_file, relative_to, resolve_glob_patterns};
use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;
use toml_edit::{DocumentMut, Item, value};
use tracing::warn;

const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Workspace backend for Cargo.
pub struct CargoWorkspace;

impl WorkspaceBackend for CargoWorkspace {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn discover(&self, root: &Path) -> Result<Vec<Package>> {
        let root_manifest = root.join("Cargo.toml");
        if !root_manifest.exists() {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        }

        let root_doc = parse(&root_manifest)?;
        let workspace = root_doc.get("workspace");
        let workspace_version = workspace
            .and_then(|w| w.get("package"))
            .and_then(|p| p.get("version"))
            .and_then(Value::as_str)
            .map(String::from);

        let mut packages = Vec::new();

        if let Some(ws) = workspace {
            let members = string_array(ws.get("members"));
            let exclude = string_array(ws.get("exclude"));
            for dir in resolve_glob_patterns(root, &members, &exclude)? {
                let manifest = dir.join("Cargo.toml");
                if !manifest.exists() {
                    continue;
                }
                match parse(&manifest).and_then(|doc| {
                    read_package(&doc, root, &dir, &manifest, workspace_version.as_deref())
                }) {
                    Ok(Some(pkg)) => packages.push(pkg),
                    Ok(None) => {}
                    Err(e) => warn!(
                        manifest = %manifest.display(),
                        error = %e,
                        "Skipping unreadable crate"
                    ),
                }
            }
            // A virtual manifest has no [package]; a root package is also a member.
            if let Some(pkg) =
                read_package(&root_doc, root, root, &root_manifest, workspace_version.as_deref())?
                && !packages.iter().any(|p| p.name == pkg.name)
            {
                packages.push(pkg);
            }
        } else if let Some(pkg) = read_package(&root_doc, root, root, &root_manifest, None)? {
            packages.push(pkg);
        }

        Ok(finalize(packages))
    }

    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String> {
        let mut doc: DocumentMut = manifest
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::edit(e.to_string()))?;

        for table_name in DEPENDENCY_TABLES {
            let Some(table) = doc.get_mut(table_name).and_then(Item::as_table_like_mut) else {
                continue;
            };
            let keys: Vec<String> = table.iter().map(|(k, _)| k.to_string()).collect();
            for key in keys {
                let Some(item) = table.get_mut(&key) else {
                    continue;
                };
                let crate_name = item
                    .as_table_like()
                    .and_then(|t| t.get("package"))
                    .and_then(Item::as_str)
                    .unwrap_or(&key)
                    .to_string();
                let Some(version) = pins.get(&crate_name) else {
                    continue;
                };
                let exact = format!("={version}");
                if let Some(dep) = item.as_table_like_mut() {
                    dep.remove("workspace");
                    dep.insert("version", value(exact));
                } else {
                    *item = value(exact);
                }
            }
        }

        Ok(doc.to_string())
    }

    fn set_version(&self, content: &str, version: &str) -> Result<String> {
        let mut doc: DocumentMut = content
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::edit(e.to_string()))?;

        let Some(package) = doc.get_mut("package").and_then(Item::as_table_like_mut) else {
            return Err(Error::edit("manifest has no [package] table"));
        };
        if package.get("version").is_some_and(|v| v.as_str().is_none()) {
            return Err(Error::edit(
                "package version is inherited from the workspace; bump [workspace.package] instead",
            ));
        }
        package.insert("version", value(version));
        Ok(doc.to_string())
    }
}

fn parse(path: &Path) -> Result<Value> {
    let content = read_file(path)?;
    toml::from_str(&content).map_err(|e| Error::Toml {
        source: e,
        path: Some(path.to_path_buf()),
    })
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn read_package(
    doc: &Value,
    root: &Path,
    dir: &Path,
    manifest: &Path,
    workspace_version: Option<&str>,
) -> Result<Option<Package>> {
    let Some(package) = doc.get("package") else {
        return Ok(None);
    };
    let name = package
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_manifest(manifest, "[package] has no name"))?;

    let version = match package.get("version") {
        Some(Value::String(v)) => v.clone(),
        Some(Value::Table(t)) if t.get("workspace").and_then(Value::as_bool) == Some(true) => {
            workspace_version
                .ok_or_else(|| {
                    Error::invalid_manifest(
                        manifest,
                        "version.workspace = true but no [workspace.package].version",
                    )
                })?
                .to_string()
        }
        _ => "0.0.0".to_string(),
    };

    let publishable = !matches!(package.get("publish"), Some(Value::Boolean(false)))
        && !matches!(package.get("publish"), Some(Value::Array(a)) if a.is_empty());

    let mut pkg = Package::new(name, version, relative_to(root, dir), manifest, Ecosystem::Rust);
    pkg.publishable = publishable;

    for table_name in DEPENDENCY_TABLES {
        let Some(table) = doc.get(table_name).and_then(Value::as_table) else {
            continue;
        };
        for (key, spec) in table {
            let dep_name = spec
                .get("package")
                .and_then(Value::as_str)
                .unwrap_or(key);
            pkg.dependencies.insert(dep_name.to_string());
        }
    }

    Ok(Some(pkg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_workspace_members() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "Cargo.toml",
            "[workspace]\nmembers = [\"crates/*\"]\nexclude = [\"crates/scratch\"]\n\n\
                [workspace.package]\nversion = \"0.3.0\"\n",
        );
        write(
            root,
            "crates/core/Cargo.toml",
            "[package]\nname = \"acme-core\"\nversion.workspace = true\n\n[dependencies]\n\
                serde = \"1\"\n",
        );
        write(
            root,
            "crates/cli/Cargo.toml",
            "[package]\nname = \"acme-cli\"\nversion = \"1.2.0\"\n\n[dependencies]\n\
                core = { package = \"acme-core\", path = \"../core\" }\n",
        );
        write(
            root,
            "crates/internal/Cargo.toml",
            "[package]\nname = \"acme-internal\"\nversion = \"0.1.0\"\npublish = false\n",
        );
        write(root, "crates/scratch/Cargo.toml", "[package]\nname = \"scratch\"\n");
        write(root, "crates/broken/Cargo.toml", "[package\nname=");

        let packages = CargoWorkspace.discover(root).unwrap();
        let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["acme-cli", "acme-core", "acme-internal"]);

        let cli = &packages[0];
        assert_eq!(cli.version, "1.2.0");
        assert_eq!(cli.path, Path::new("crates/cli"));
        assert!(cli.dependencies.contains("acme-core"));

        let core = &packages[1];
        assert_eq!(core.version, "0.3.0");
        assert!(core.dependencies.is_empty());

        assert!(!packages[2].publishable);
    }

    #[test]
    fn test_discover_single_package() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Cargo.toml", "[package]\nname = \"solo\"\nversion = \"2.0.0\"\n");

        let packages = CargoWorkspace.discover(temp.path()).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "solo");
        assert_eq!(packages[0].path, Path::new(""));
    }

    #[test]
    fn test_discover_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = CargoWorkspace.discover(temp.path()).unwrap_err();
        assert!(matches!(err, Error::WorkspaceNotFound { .. }));
    }

    #[test]
    fn test_pin_dependencies_variants() {
        let manifest = r#"[package]
name = "acme-cli"
version = "1.0.0"

[dependencies]
# keep this comment
acme-core = { path = "../core" }
acme-util.workspace = true
renamed = { package = "acme-macros", path = "../macros", features = ["x"] }
plain = "0.1"
serde = "1"
"#;
        let pins = BTreeMap::from([
            ("acme-core".to_string(), "1.3.0".to_string()),
            ("acme-util".to_string(), "0.2.1".to_string()),
            ("acme-macros".to_string(), "4.0.0".to_string()),
            ("plain".to_string(), "0.1.5".to_string()),
        ]);

        let out = CargoWorkspace.pin_dependencies(manifest, &pins).unwrap();
        let doc: Value = toml::from_str(&out).unwrap();
        let deps = doc.get("dependencies").unwrap();
        assert_eq!(deps["acme-core"]["version"].as_str(), Some("=1.3.0"));
        assert_eq!(deps["acme-core"]["path"].as_str(), Some("../core"));
        assert_eq!(deps["acme-util"]["version"].as_str(), Some("=0.2.1"));
        assert!(deps["acme-util"].get("workspace").is_none());
        assert_eq!(deps["renamed"]["version"].as_str(), Some("=4.0.0"));
        assert_eq!(deps["plain"].as_str(), Some("=0.1.5"));
        assert_eq!(deps["serde"].as_str(), Some("1"));
        assert!(out.contains("# keep this comment"));
    }

    #[test]
    fn test_set_version() {
        let out = CargoWorkspace
            .set_version("[package]\nname = \"a\"\nversion = \"1.0.0\" # current\n", "1.1.0")
            .unwrap();
        let doc: Value = toml::from_str(&out).unwrap();
        assert_eq!(doc["package"]["version"].as_str(), Some("1.1.0"));
    }

    #[test]
    fn test_set_version_rejects_inherited() {
        let err = CargoWorkspace
            .set_version("[package]\nname = \"a\"\nversion.workspace = true\n", "1.1.0")
            .unwrap_err();
        assert!(err.to_string().contains("inherited"));
    }
}
