//! Release manifest artifact.
//!
//! A JSON record of what a publish run did, written at the end of every
//! non-dry run and read back by rollback to resolve the packages behind a
//! tag. Rollback marks the versions it undid as
//! [`PublishStatus::RolledBack`]; those entries are carried into later
//! manifests so publish never re-tags them.

use crate::error::{Error, Result};
use crate::pipeline::{PublishReport, PublishStatus};
use crate::rollback::RolledBackPackage;
use chrono::{DateTime, Utc};
use releasekit_workspaces::Ecosystem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Current manifest schema version.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// One package in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Package name.
    pub name: String,
    /// Ecosystem.
    pub ecosystem: Ecosystem,
    /// Version handled by the run.
    pub version: String,
    /// Per-package tag.
    pub tag: String,
    /// Publish outcome.
    pub status: PublishStatus,
    /// Combined artifact checksum, when built.
    pub checksum: Option<String>,
}

/// The manifest artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Schema version.
    pub schema_version: u32,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
    /// Commit the run published from.
    pub git_sha: String,
    /// Umbrella tag of the release, if any.
    pub umbrella_tag: Option<String>,
    /// Packages in report order.
    pub packages: Vec<ManifestEntry>,
}

impl ReleaseManifest {
    /// A manifest with no packages.
    #[must_use]
    pub fn empty(git_sha: impl Into<String>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            created_at: Utc::now(),
            git_sha: git_sha.into(),
            umbrella_tag: None,
            packages: Vec::new(),
        }
    }

    /// Build a manifest from a publish report.
    #[must_use]
    pub fn from_report(
        report: &PublishReport,
        git_sha: impl Into<String>,
        umbrella_tag: Option<String>,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            created_at: Utc::now(),
            git_sha: git_sha.into(),
            umbrella_tag,
            packages: report
                .results
                .iter()
                .map(|r| ManifestEntry {
                    name: r.package.clone(),
                    ecosystem: r.ecosystem,
                    version: r.version.clone(),
                    tag: r.tag.clone(),
                    status: r.status,
                    checksum: r.checksum.clone(),
                })
                .collect(),
        }
    }

    /// Write the manifest as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json)?;
        info!(
            path = %path.display(),
            packages = self.packages.len(),
            "Wrote release manifest"
        );
        Ok(())
    }

    /// Read a manifest, or `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable files, malformed JSON or an
    /// unsupported schema version.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No release manifest");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let manifest: Self = serde_json::from_str(&content)?;
        if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
            return Err(Error::config(
                format!(
                    "release manifest {} has schema version {}, \
                     newest supported is {MANIFEST_SCHEMA_VERSION}",
                    path.display(),
                    manifest.schema_version
                ),
                "Upgrade releasekit",
            ));
        }
        Ok(Some(manifest))
    }

    /// Whether `name@version` was rolled back.
    #[must_use]
    pub fn is_rolled_back(&self, name: &str, version: &str) -> bool {
        self.packages.iter().any(|e| {
            e.status == PublishStatus::RolledBack && e.name == name && e.version == version
        })
    }

    /// Mark `packages` as rolled back, adding entries for versions this
    /// manifest does not record.
    pub fn mark_rolled_back(&mut self, packages: &[RolledBackPackage], ecosystem: Ecosystem) {
        for package in packages {
            let mut found = false;
            for entry in self
                .packages
                .iter_mut()
                .filter(|e| e.name == package.name && e.version == package.version)
            {
                entry.status = PublishStatus::RolledBack;
                found = true;
            }
            if !found {
                self.packages.push(ManifestEntry {
                    name: package.name.clone(),
                    ecosystem,
                    version: package.version.clone(),
                    tag: package.tag.clone(),
                    status: PublishStatus::RolledBack,
                    checksum: None,
                });
            }
        }
    }

    /// Copy the rolled-back entries of `previous` that this run did not
    /// handle again.
    pub fn carry_rolled_back(&mut self, previous: &Self) {
        for entry in previous
            .packages
            .iter()
            .filter(|e| e.status == PublishStatus::RolledBack)
        {
            let handled = self
                .packages
                .iter()
                .any(|e| e.name == entry.name && e.version == entry.version);
            if !handled {
                self.packages.push(entry.clone());
            }
        }
    }

    /// Entries released under `tag`. The umbrella tag covers every entry.
    #[must_use]
    pub fn entries_for_tag(&self, tag: &str) -> Vec<&ManifestEntry> {
        if self.umbrella_tag.as_deref() == Some(tag) {
            return self.packages.iter().collect();
        }
        self.packages.iter().filter(|e| e.tag == tag).collect()
    }
}
