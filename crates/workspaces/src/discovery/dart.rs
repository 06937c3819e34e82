//! Dart pub workspaces via the root `pubspec.yaml` `workspace:` list.

use super::{WorkspaceBackend, finalize, read_yaml_file, relative_to, resolve_glob_patterns};
use crate::error::{Error, Result};
use crate::package::{Ecosystem, Package};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

const DEPENDENCY_FIELDS: [&str; 2] = ["dependencies", "dev_dependencies"];

/// Workspace backend for Dart pub workspaces.
pub struct DartWorkspace;

impl WorkspaceBackend for DartWorkspace {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Dart
    }

    fn discover(&self, root: &Path) -> Result<Vec<Package>> {
        let root_manifest = root.join("pubspec.yaml");
        if !root_manifest.exists() {
            return Err(Error::WorkspaceNotFound {
                path: root.to_path_buf(),
            });
        }
        let root_doc: Value = read_yaml_file(&root_manifest)?;

        let members: Vec<String> = root_doc
            .get("workspace")
            .and_then(Value::as_sequence)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut packages = Vec::new();
        if members.is_empty() {
            packages.extend(read_package(&root_doc, root, root, &root_manifest));
            return Ok(finalize(packages));
        }

        for dir in resolve_glob_patterns(root, &members, &[])? {
            let manifest = dir.join("pubspec.yaml");
            if !manifest.exists() {
                continue;
            }
            match read_yaml_file::<Value>(&manifest) {
                Ok(doc) => packages.extend(read_package(&doc, root, &dir, &manifest)),
                Err(e) => warn!(
                    manifest = %manifest.display(),
                    error = %e,
                    "Skipping unreadable pubspec.yaml"
                ),
            }
        }

        Ok(finalize(packages))
    }

    fn pin_dependencies(&self, manifest: &str, pins: &BTreeMap<String, String>) -> Result<String> {
        parse_mapping(manifest)?;
        let mut out = Vec::new();
        let mut in_dependencies = false;
        // Indentation of a pinned entry whose nested spec is being dropped.
        let mut replaced: Option<usize> = None;

        for line in manifest.lines() {
            let (code, comment) = split_comment(line);
            let indent = indentation(line);
            if code.trim().is_empty() {
                out.push(line.to_string());
                continue;
            }
            if let Some(level) = replaced {
                if indent > level {
                    continue;
                }
                replaced = None;
            }
            if indent == 0 {
                in_dependencies =
                    top_level_key(code).is_some_and(|k| DEPENDENCY_FIELDS.contains(&k));
                out.push(line.to_string());
                continue;
            }
            let pinned = in_dependencies
                .then(|| top_level_key(code.trim_start()))
                .flatten()
                .and_then(|name| pins.get(name).map(|version| (name, version)));
            match pinned {
                Some((name, version)) => {
                    out.push(format!("{}{name}: {version}{comment}", &line[..indent]));
                    replaced = Some(indent);
                }
                None => out.push(line.to_string()),
            }
        }

        Ok(join_lines(&out, manifest))
    }

    fn set_version(&self, content: &str, version: &str) -> Result<String> {
        parse_mapping(content)?;
        let mut out: Vec<String> = Vec::new();
        let mut found = false;
        let mut name_at = None;

        for line in content.lines() {
            let (code, comment) = split_comment(line);
            match top_level_key(code).filter(|_| indentation(line) == 0) {
                Some("version") if !found => {
                    out.push(format!("version: {version}{comment}"));
                    found = true;
                }
                Some("name") => {
                    out.push(line.to_string());
                    name_at = Some(out.len());
                }
                _ => out.push(line.to_string()),
            }
        }
        if !found {
            out.insert(name_at.unwrap_or(0), format!("version: {version}"));
        }

        Ok(join_lines(&out, content))
    }
}

fn parse_mapping(content: &str) -> Result<Mapping> {
    serde_yaml::from_str(content).map_err(|e| Error::Yaml {
        source: e,
        path: None,
    })
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// The key of a `key:` or `key: value` line.
fn top_level_key(code: &str) -> Option<&str> {
    let (key, rest) = code.split_once(':')?;
    let key = key.trim_end();
    let valid = !key.is_empty()
        && !key.starts_with(['-', '#'])
        && (rest.is_empty() || rest.starts_with(char::is_whitespace));
    valid.then(|| key.trim_matches(|c| c == '"' || c == '\''))
}

/// Split a line before its trailing comment, keeping the whitespace in
/// front of `#` with the comment.
fn split_comment(line: &str) -> (&str, &str) {
    let mut quote = None;
    let mut prev_blank = true;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') if prev_blank => {
                let code = line[..i].trim_end();
                return (code, &line[code.len()..]);
            }
            _ => {}
        }
        prev_blank = c.is_whitespace();
    }
    (line, "")
}

fn join_lines(lines: &[String], original: &str) -> String {
    let mut out = lines.join("\n");
    if original.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn read_package(doc: &Value, root: &Path, dir: &Path, manifest: &Path) -> Option<Package> {
    let name = doc.get("name").and_then(Value::as_str)?;
    let version = doc
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0");

    let mut pkg = Package::new(name, version, relative_to(root, dir), manifest, Ecosystem::Dart);
    pkg.publishable = doc.get("publish_to").and_then(Value::as_str) != Some("none");

    for field in DEPENDENCY_FIELDS {
        if let Some(deps) = doc.get(field).and_then(Value::as_mapping) {
            pkg.dependencies
                .extend(deps.keys().filter_map(Value::as_str).map(String::from));
        }
    }
    Some(pkg)
}
