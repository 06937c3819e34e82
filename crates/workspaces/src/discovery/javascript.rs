//! JavaScript workspaces via `package.json` `workspaces` or `pnpm-workspace.yaml`.

use super::{
    WorkspaceBackend, finalize, read_json_file, read_yaml_file, relative_to,
    resolve_glob_patterns,
};
use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

const DEPENDENCY_FIELDS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Workspace backend for npm and pnpm workspaces.
pub struct JavaScriptWorkspace;

#[derive(Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

impl JavaScriptWorkspace {
    fn member_patterns(root: &Path, root_json: Option<&Value>) -> Result<Vec<String>> {
        let pnpm = root.join("pnpm-workspace.yaml");
        if pnpm.exists() {
            let ws: PnpmWorkspace = read_yaml_file(&pnpm)?;
            return Ok(ws.packages);
        }

        let patterns = match root_json.and_then(|v| v.get("workspaces")) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Object(obj)) => obj
                .get("packages")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice),
            _ => &[],
        };
        Ok(patterns
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect())
    }
}

impl WorkspaceBackend for JavaScriptWorkspace {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::JavaScript
    }

    fn discover(&self, root: &Path) -> Result<Vec<Package>> {
        let root_manifest = root.join("package.json");
        let has_pnpm = root.join("pnpm-workspace.yaml").exists();
        if !root_manifest.exists() && !has_pnpm {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        }

        let root_json: Option<Value> = if root_manifest.exists() {
            Some(read_json_file(&root_manifest)?)
        } else {
            None
        };

        let patterns = Self::member_patterns(root, root_json.as_ref())?;
        let mut packages = Vec::new();

        if patterns.is_empty() {
            if let Some(json) = &root_json
                && let Some(pkg) = read_package(json, root, root, &root_manifest)
            {
                packages.push(pkg);
            }
            return Ok(finalize(packages));
        }

        for dir in resolve_glob_patterns(root, &patterns, &[])? {
            let manifest = dir.join("package.json");
            if !manifest.exists() {
                continue;
            }
            match read_json_file::<Value>(&manifest) {
                Ok(json) => {
                    if let Some(pkg) = read_package(&json, root, &dir, &manifest) {
                        packages.push(pkg);
                    }
                }
                Err(e) => warn!(
                    manifest = %manifest.display(),
                    error = %e,
                    "Skipping unreadable package.json"
                ),
            }
        }

        Ok(finalize(packages))
    }

    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String> {
        let mut json: Value = serde_json::from_str(manifest).map_err(|e| Error::Json {
            source: e,
            path: None,
        })?;

        for field in DEPENDENCY_FIELDS {
            let Some(deps) = json.get_mut(field).and_then(Value::as_object_mut) else {
                continue;
            };
            for (name, spec) in deps.iter_mut() {
                if let Some(version) = pins.get(name) {
                    *spec = Value::String(version.clone());
                }
            }
        }

        render(&json)
    }

    fn set_version(&self, content: &str, version: &str) -> Result<String> {
        let mut json: Value = serde_json::from_str(content).map_err(|e| Error::Json {
            source: e,
            path: None,
        })?;
        let Some(obj) = json.as_object_mut() else {
            return Err(Error::edit("package.json is not an object"));
        };
        obj.insert("version".to_string(), Value::String(version.to_string()));
        render(&json)
    }
}

fn render(json: &Value) -> Result<String> {
    let mut out = serde_json::to_string_pretty(json).map_err(|e| Error::Json {
        source: e,
        path: None,
    })?;
    out.push('\n');
    Ok(out)
}

fn read_package(json: &Value, root: &Path, dir: &Path, manifest: &Path) -> Option<Package> {
    let name = json.get("name").and_then(Value::as_str)?;
    let version = json
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0");

    let path = relative_to(root, dir);
    let mut pkg = Package::new(name, version, path, manifest, Ecosystem::JavaScript);
    pkg.publishable = json.get("private").and_then(Value::as_bool) != Some(true);

    for field in DEPENDENCY_FIELDS {
        if let Some(deps) = json.get(field).and_then(Value::as_object) {
            pkg.dependencies.extend(deps.keys().cloned());
        }
    }
    Some(pkg)
}
