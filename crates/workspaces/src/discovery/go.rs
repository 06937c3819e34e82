//! Go module sets via `go.work`.
//!
//! Go modules carry no version in `go.mod`; releases are identified by
//! tags. The current version is tracked in a `VERSION` file next to each
//! `go.mod` (absent means `0.0.0`).

use super::{WorkspaceBackend, finalize, read_file, relative_to};
use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

const VERSION_FILE: &str = "VERSION";

/// Workspace backend for Go workspaces.
pub struct GoWorkspace;

/// Directories listed by `use` directives in a `go.work` file.
fn parse_use_directives(go_work: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut in_block = false;
    for line in go_work.lines() {
        let line = strip_comment(line).trim();
        if in_block {
            if line == ")" {
                in_block = false;
            } else if !line.is_empty() {
                dirs.push(line.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("use") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else if !rest.is_empty() {
                dirs.push(rest.to_string());
            }
        }
    }
    dirs
}

fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or("")
}

fn module_path(go_mod: &str) -> Option<String> {
    go_mod
        .lines()
        .map(|l| strip_comment(l).trim())
        .find_map(|l| l.strip_prefix("module "))
        .map(|m| m.trim().trim_matches('"').to_string())
}

/// Module paths from `require` directives.
fn required_modules(go_mod: &str) -> Vec<String> {
    let mut modules = Vec::new();
    let mut in_block = false;
    for line in go_mod.lines() {
        let line = strip_comment(line).trim();
        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(module) = line.split_whitespace().next() {
                modules.push(module.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("require ") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else if let Some(module) = rest.split_whitespace().next() {
                modules.push(module.to_string());
            }
        }
    }
    modules
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Replace,
}

impl WorkspaceBackend for GoWorkspace {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn discover(&self, root: &Path) -> Result<Vec<Package>> {
        let go_work = root.join("go.work");
        let dirs: Vec<PathBuf> = if go_work.exists() {
            parse_use_directives(&read_file(&go_work)?)
                .into_iter()
                .map(|d| root.join(d.trim_start_matches("./")))
                .collect()
        } else if root.join("go.mod").exists() {
            vec![root.to_path_buf()]
        } else {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        };

        let mut packages = Vec::new();
        for dir in dirs {
            let manifest = dir.join("go.mod");
            if !manifest.exists() {
                warn!(dir = %dir.display(), "go.work entry has no go.mod");
                continue;
            }
            let content = read_file(&manifest)?;
            let Some(name) = module_path(&content) else {
                return Err(Error::invalid_manifest(&manifest, "missing module directive"));
            };
            let version_path = dir.join(VERSION_FILE);
            let version = if version_path.exists() {
                read_file(&version_path)?.trim().trim_start_matches('v').to_string()
            } else {
                "0.0.0".to_string()
            };

            let path = relative_to(root, &dir);
            let mut pkg = Package::new(name, version, path, &manifest, Ecosystem::Go);
            pkg.dependencies.extend(required_modules(&content));
            packages.push(pkg);
        }

        Ok(finalize(packages))
    }

    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String> {
        let mut out = Vec::new();
        let mut block = Block::None;

        for line in manifest.lines() {
            let code = strip_comment(line).trim();
            match block {
                Block::Require if code == ")" => block = Block::None,
                Block::Replace if code == ")" => block = Block::None,
                Block::Require => {
                    out.push(pin_require_line(line, code, pins));
                    continue;
                }
                Block::Replace => {
                    if replaces_pinned(code, pins) {
                        continue;
                    }
                }
                Block::None => {
                    if code == "require (" {
                        block = Block::Require;
                    } else if code == "replace (" {
                        block = Block::Replace;
                    } else if let Some(rest) = code.strip_prefix("require ") {
                        out.push(pin_require_line(line, rest, pins));
                        continue;
                    } else if let Some(rest) = code.strip_prefix("replace ")
                        && replaces_pinned(rest, pins)
                    {
                        continue;
                    }
                }
            }
            out.push(line.to_string());
        }

        let mut result = out.join("\n");
        if manifest.ends_with('\n') {
            result.push('\n');
        }
        Ok(result)
    }

    fn set_version(&self, _content: &str, version: &str) -> Result<String> {
        Ok(format!("{version}\n"))
    }

    fn version_file(&self, package: &Package) -> PathBuf {
        package
            .manifest_path
            .parent()
            .map_or_else(|| PathBuf::from(VERSION_FILE), |dir| dir.join(VERSION_FILE))
    }
}

/// Rewrite the version of one `module version` requirement if it is pinned.
fn pin_require_line(line: &str, code: &str, pins: &BTreeMap<String, String>) -> String {
    let mut parts = code.split_whitespace();
    let (Some(module), Some(current)) = (parts.next(), parts.next()) else {
        return line.to_string();
    };
    match pins.get(module) {
        Some(version) => {
            line.replacen(current, &format!("v{}", version.trim_start_matches('v')), 1)
        }
        None => line.to_string(),
    }
}

fn replaces_pinned(directive: &str, pins: &BTreeMap<String, String>) -> bool {
    directive
        .split_whitespace()
        .next()
        .is_some_and(|module| pins.contains_key(module))
}
