//! Changeset parsing and storage.
//!
//! Changesets are Markdown files in the configured changeset directory that
//! declare intended bumps by hand. They are merged with commit-derived bumps
//! and deleted once the release that consumed them has been tagged.
//!
//! # Changeset Format
//!
//! ```markdown
//! ---
//! "package-name": minor
//! "another-package": patch
//! ---
//!
//! Summary of the change (first line is the title)
//!
//! Optional longer description with more details.
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Default directory for changesets, relative to the repository root.
pub const DEFAULT_CHANGESET_DIR: &str = ".changeset";

/// Severity of a version change.
///
/// The order `None < Patch < Minor < Major` is total, so merging bumps from
/// several sources is `max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// No version change.
    #[default]
    None,
    /// Patch version bump (0.0.X).
    Patch,
    /// Minor version bump (0.X.0).
    Minor,
    /// Major version bump (X.0.0).
    Major,
}

impl BumpType {
    /// Parse a bump type from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid bump type.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "none" => Ok(Self::None),
            _ => Err(Error::changeset_parse(
                format!("Invalid bump type: {s}. Expected major, minor, patch, or none"),
                None,
            )),
        }
    }

    /// Whether this bump changes the version at all.
    #[must_use]
    pub fn is_some(self) -> bool {
        self != Self::None
    }
}

impl FromStr for BumpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// A changeset: declared bumps plus a free-text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Identifier, the file stem.
    pub id: String,
    /// Summary of the change (first body line).
    pub summary: String,
    /// Declared bump per package.
    pub packages: BTreeMap<String, BumpType>,
    /// Optional longer description.
    pub description: Option<String>,
}

impl Changeset {
    /// Parse a changeset from its Markdown content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid changeset format.
    pub fn parse(content: &str, id: &str) -> Result<Self> {
        let content = content.trim();
        let Some(after_first) = content.strip_prefix("---") else {
            return Err(Error::changeset_parse(
                "Changeset must start with '---' frontmatter delimiter",
                None,
            ));
        };
        let Some(end_idx) = after_first.find("\n---") else {
            return Err(Error::changeset_parse(
                "Missing closing '---' frontmatter delimiter",
                None,
            ));
        };

        let frontmatter = after_first[..end_idx].trim();
        let body = after_first[end_idx + 4..].trim();

        let packages = Self::parse_frontmatter(frontmatter)?;
        let (summary, description) = Self::parse_body(body);

        Ok(Self {
            id: id.to_string(),
            summary,
            packages,
            description,
        })
    }

    fn parse_frontmatter(frontmatter: &str) -> Result<BTreeMap<String, BumpType>> {
        let mut packages = BTreeMap::new();
        for line in frontmatter.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((name_part, bump_part)) = line.rsplit_once(':') else {
                return Err(Error::changeset_parse(
                    format!("Invalid frontmatter line: {line}. Expected '\"package\": bump'"),
                    None,
                ));
            };
            let name = name_part.trim().trim_matches('"').trim_matches('\'');
            if name.is_empty() {
                return Err(Error::changeset_parse("Empty package name in frontmatter", None));
            }
            let bump = BumpType::parse(bump_part.trim().trim_matches('"').trim_matches('\''))?;
            let entry = packages.entry(name.to_string()).or_insert(bump);
            *entry = (*entry).max(bump);
        }
        Ok(packages)
    }

    fn parse_body(body: &str) -> (String, Option<String>) {
        let mut lines = body.lines();
        let summary = lines
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_default();

        let rest: Vec<&str> = lines.skip_while(|l| l.trim().is_empty()).collect();
        let description = rest.join("\n").trim().to_string();
        (summary, (!description.is_empty()).then_some(description))
    }

    /// Render the changeset back to Markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        use std::fmt::Write;

        let mut output = String::from("---\n");
        for (name, bump) in &self.packages {
            let _ = writeln!(output, "\"{name}\": {bump}");
        }
        output.push_str("---\n\n");
        output.push_str(&self.summary);
        output.push('\n');
        if let Some(desc) = &self.description {
            output.push('\n');
            output.push_str(desc);
            output.push('\n');
        }
        output
    }
}

/// Reads, aggregates and consumes changesets in one directory.
pub struct ChangesetStore {
    dir: PathBuf,
}

impl ChangesetStore {
    /// Create a store over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The changeset directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a changeset as `<id>.md`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn add(&self, changeset: &Changeset) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::changeset_io("Failed to create changeset directory", Some(self.dir.clone()), e)
        })?;
        let path = self.dir.join(format!("{}.md", changeset.id));
        fs::write(&path, changeset.to_markdown())
            .map_err(|e| Error::changeset_io("Failed to write changeset", Some(path.clone()), e))?;
        Ok(path)
    }

    /// List all pending changesets, sorted by id. `README.md` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed.
    pub fn list(&self) -> Result<Vec<Changeset>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::changeset_io("Failed to read changeset directory", Some(self.dir.clone()), e)
        })?;

        let mut changesets = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| {
                    Error::changeset_io("Failed to read directory entry", Some(self.dir.clone()), e)
                })?
                .path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.extension().is_none_or(|ext| ext != "md")
                || stem.eq_ignore_ascii_case("readme")
            {
                continue;
            }

            let content = fs::read_to_string(&path)
                .map_err(|e| {
                    Error::changeset_io("Failed to read changeset", Some(path.clone()), e)
                })?;
            let changeset = Changeset::parse(&content, stem).map_err(|e| match e {
                Error::ChangesetParse { message, .. } => {
                    Error::changeset_parse(message, Some(path.clone()))
                }
                other => other,
            })?;
            debug!(id = %changeset.id, packages = changeset.packages.len(), "Loaded changeset");
            changesets.push(changeset);
        }

        changesets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(changesets)
    }

    /// Aggregate the highest declared bump per package, together with the
    /// ids of the changesets that declared it.
    #[must_use]
    pub fn package_bumps(changesets: &[Changeset]) -> BTreeMap<String, (BumpType, Vec<String>)> {
        let mut bumps: BTreeMap<String, (BumpType, Vec<String>)> = BTreeMap::new();
        for changeset in changesets {
            for (name, bump) in &changeset.packages {
                let entry = bumps.entry(name.clone()).or_default();
                entry.0 = entry.0.max(*bump);
                entry.1.push(changeset.id.clone());
            }
        }
        bumps
    }

    /// Delete the given changesets. Missing files are ignored so a repeated
    /// call is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn consume(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            let path = self.dir.join(format!("{id}.md"));
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::changeset_io("Failed to remove changeset", Some(path), e));
                }
            }
        }
        info!(removed, "Consumed changesets");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bump_type_order_and_parse() {
        assert!(BumpType::None < BumpType::Patch);
        assert!(BumpType::Patch < BumpType::Minor);
        assert!(BumpType::Minor < BumpType::Major);
        assert_eq!(BumpType::parse(" MINOR ").unwrap(), BumpType::Minor);
        assert!(BumpType::parse("huge").is_err());
        assert_eq!(BumpType::Patch.max(BumpType::Minor), BumpType::Minor);
    }

    #[test]
    fn test_parse_changeset() {
        let content = r#"---
"genkit": minor
'genkit-plugin-google': patch
---

Add streaming support

Streams tokens as they arrive.
"#;
        let cs = Changeset::parse(content, "brave-lions").unwrap();
        assert_eq!(cs.id, "brave-lions");
        assert_eq!(cs.packages["genkit"], BumpType::Minor);
        assert_eq!(cs.packages["genkit-plugin-google"], BumpType::Patch);
        assert_eq!(cs.summary, "Add streaming support");
        assert_eq!(cs.description.as_deref(), Some("Streams tokens as they arrive."));
    }

    #[test]
    fn test_parse_scoped_npm_name() {
        let cs = Changeset::parse("---\n\"@acme/core\": major\n---\nBreak it\n", "x").unwrap();
        assert_eq!(cs.packages["@acme/core"], BumpType::Major);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Changeset::parse("no frontmatter", "x").is_err());
        assert!(Changeset::parse("---\n\"a\": minor\n", "x").is_err());
        assert!(Changeset::parse("---\n\"a\" minor\n---\nbody", "x").is_err());
        assert!(Changeset::parse("---\n\"a\": giant\n---\nbody", "x").is_err());
    }

    #[test]
    fn test_markdown_round_trip() {
        let cs = Changeset {
            id: "abc".into(),
            summary: "Fix crash".into(),
            packages: BTreeMap::from([("core".to_string(), BumpType::Patch)]),
            description: None,
        };
        assert_eq!(Changeset::parse(&cs.to_markdown(), "abc").unwrap(), cs);
    }

    #[test]
    fn test_store_list_aggregate_consume() {
        let temp = TempDir::new().unwrap();
        let store = ChangesetStore::new(temp.path().join(".changeset"));
        assert!(store.list().unwrap().is_empty());

        for (id, bump) in [("a", BumpType::Patch), ("b", BumpType::Minor)] {
            store
                .add(&Changeset {
                    id: id.into(),
                    summary: format!("change {id}"),
                    packages: BTreeMap::from([("core".to_string(), bump)]),
                    description: None,
                })
                .unwrap();
        }
        fs::write(store.dir().join("README.md"), "# Changesets\n").unwrap();

        let changesets = store.list().unwrap();
        assert_eq!(changesets.len(), 2);

        let bumps = ChangesetStore::package_bumps(&changesets);
        assert_eq!(bumps["core"].0, BumpType::Minor);
        assert_eq!(bumps["core"].1, vec!["a", "b"]);

        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(store.consume(&ids).unwrap(), 2);
        assert_eq!(store.consume(&ids).unwrap(), 0);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_reports_path_on_parse_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("bad.md"), "not a changeset").unwrap();
        let err = ChangesetStore::new(temp.path()).list().unwrap_err();
        match err {
            Error::ChangesetParse { path, .. } => {
                assert_eq!(path, Some(temp.path().join("bad.md")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
