//! Python workspaces via `pyproject.toml` with `[tool.uv.workspace]`.

use super::{WorkspaceBackend, finalize, read_file, relative_to, resolve_glob_patterns};
use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use toml::Value;
use toml_edit::{Array, DocumentMut, Item, value};
use tracing::warn;

/// `name[extras] specifier ; marker`
static REQUIREMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[[^\]]*\])?\s*([^;]*?)\s*(;.*)?$").ok()
});

const PRIVATE_CLASSIFIER: &str = "Private :: Do Not Upload";

/// Workspace backend for uv-managed Python workspaces.
pub struct PythonWorkspace;

/// Normalize a distribution name per PEP 503.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Distribution name of a PEP 508 requirement string.
fn requirement_name(requirement: &str) -> Option<&str> {
    let re = REQUIREMENT.as_ref()?;
    re.captures(requirement)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn pin_requirement(requirement: &str, version: &str) -> Option<String> {
    let re = REQUIREMENT.as_ref()?;
    let caps = re.captures(requirement)?;
    let name = caps.get(1)?.as_str();
    let extras = caps.get(2).map_or("", |m| m.as_str());
    let marker = caps.get(4).map_or(String::new(), |m| format!(" {}", m.as_str().trim()));
    Some(format!("{name}{extras}=={version}{marker}"))
}

impl WorkspaceBackend for PythonWorkspace {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn discover(&self, root: &Path) -> Result<Vec<Package>> {
        let root_manifest = root.join("pyproject.toml");
        if !root_manifest.exists() {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        }
        let root_doc = parse(&root_manifest)?;
        let workspace = root_doc
            .get("tool")
            .and_then(|t| t.get("uv"))
            .and_then(|u| u.get("workspace"));

        let mut packages = Vec::new();
        if let Some(ws) = workspace {
            let members = string_array(ws.get("members"));
            let exclude = string_array(ws.get("exclude"));
            for dir in resolve_glob_patterns(root, &members, &exclude)? {
                let manifest = dir.join("pyproject.toml");
                if !manifest.exists() {
                    continue;
                }
                match parse(&manifest) {
                    Ok(doc) => packages.extend(read_package(&doc, root, &dir, &manifest)),
                    Err(e) => warn!(
                        manifest = %manifest.display(),
                        error = %e,
                        "Skipping unreadable pyproject.toml"
                    ),
                }
            }
        }
        if let Some(pkg) = read_package(&root_doc, root, root, &root_manifest)
            && !packages.iter().any(|p| p.name == pkg.name)
        {
            packages.push(pkg);
        }

        // Requirements may spell names differently; map them back to the
        // declared package names.
        let by_normalized: BTreeMap<String, String> = packages
            .iter()
            .map(|p| (normalize_name(&p.name), p.name.clone()))
            .collect();
        for pkg in &mut packages {
            pkg.dependencies = pkg
                .dependencies
                .iter()
                .filter_map(|d| by_normalized.get(&normalize_name(d)).cloned())
                .collect();
        }

        Ok(finalize(packages))
    }

    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String> {
        let mut doc: DocumentMut = manifest
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::edit(e.to_string()))?;
        let pins: BTreeMap<String, &String> = pins
            .iter()
            .map(|(name, version)| (normalize_name(name), version))
            .collect();

        let Some(project) = doc.get_mut("project").and_then(Item::as_table_like_mut) else {
            return Ok(doc.to_string());
        };

        if let Some(deps) = project.get_mut("dependencies").and_then(Item::as_array_mut) {
            pin_array(deps, &pins);
        }
        if let Some(optional) = project
            .get_mut("optional-dependencies")
            .and_then(Item::as_table_like_mut)
        {
            let extras: Vec<String> = optional.iter().map(|(k, _)| k.to_string()).collect();
            for extra in extras {
                if let Some(deps) = optional.get_mut(&extra).and_then(Item::as_array_mut) {
                    pin_array(deps, &pins);
                }
            }
        }

        Ok(doc.to_string())
    }

    fn set_version(&self, content: &str, version: &str) -> Result<String> {
        let mut doc: DocumentMut = content
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::edit(e.to_string()))?;
        let Some(project) = doc.get_mut("project").and_then(Item::as_table_like_mut) else {
            return Err(Error::edit("pyproject.toml has no [project] table"));
        };
        let dynamic = project
            .get("dynamic")
            .and_then(Item::as_array)
            .is_some_and(|a| a.iter().any(|v| v.as_str() == Some("version")));
        if dynamic {
            return Err(Error::edit(
                "project version is dynamic; update the version source instead",
            ));
        }
        project.insert("version", value(version));
        Ok(doc.to_string())
    }
}

fn pin_array(deps: &mut Array, pins: &BTreeMap<String, &String>) {
    for item in deps.iter_mut() {
        let Some(requirement) = item.as_str() else {
            continue;
        };
        let Some(name) = requirement_name(requirement) else {
            continue;
        };
        let Some(version) = pins.get(&normalize_name(name)) else {
            continue;
        };
        if let Some(pinned) = pin_requirement(requirement, version) {
            let decor = item.decor().clone();
            *item = pinned.into();
            *item.decor_mut() = decor;
        }
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

fn read_package(doc: &Value, root: &Path, dir: &Path, manifest: &Path) -> Option<Package> {
    let project = doc.get("project")?;
    let name = project.get("name").and_then(Value::as_str)?;
    let version = project
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0");

    let mut pkg = Package::new(name, version, relative_to(root, dir), manifest, Ecosystem::Python);
    pkg.publishable = !string_array(project.get("classifiers"))
        .iter()
        .any(|c| c == PRIVATE_CLASSIFIER);

    let mut requirements = string_array(project.get("dependencies"));
    if let Some(optional) = project.get("optional-dependencies").and_then(Value::as_table) {
        for extra in optional.values() {
            requirements.extend(string_array(Some(extra)));
        }
    }
    if let Some(groups) = doc.get("dependency-groups").and_then(Value::as_table) {
        for group in groups.values() {
            requirements.extend(string_array(Some(group)));
        }
    }
    for requirement in &requirements {
        if let Some(dep) = requirement_name(requirement) {
            pkg.dependencies.insert(dep.to_string());
        }
    }
    Some(pkg)
}
