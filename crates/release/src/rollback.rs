//! Rollback of a released tag.
//!
//! The packages behind a tag are resolved from the release manifest when it
//! records the tag, otherwise by parsing the tag with the configured format.
//! Rolling back first yanks each package version once (when asked), then
//! deletes the local and remote tags and the forge release, and finally
//! marks the versions as rolled back in the manifest. The tag goes last, so
//! a rollback that fails part way can simply be run again. A tag that no
//! longer exists anywhere is a no-op.

use crate::backends::{Capability, Forge, Registry, Vcs, can};
use crate::config::TagFormat;
use crate::error::Result;
use crate::lock::ReleaseLock;
use crate::manifest::ReleaseManifest;
use crate::pipeline::PublishStatus;
use releasekit_workspaces::Ecosystem;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A package version a rollback applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RolledBackPackage {
    /// Package name.
    pub name: String,
    /// Version.
    pub version: String,
    /// Per-package tag.
    pub tag: String,
}

/// Result of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RollbackOutcome {
    /// The tag was already gone.
    NoOp {
        /// Requested tag.
        tag: String,
    },
    /// Something was rolled back.
    RolledBack {
        /// Requested tag.
        tag: String,
        /// Packages resolved from the tag.
        packages: Vec<RolledBackPackage>,
        /// Tags deleted locally or on the remote.
        deleted_tags: Vec<String>,
        /// Forge releases deleted.
        deleted_releases: Vec<String>,
        /// Packages yanked.
        yanked: Vec<String>,
        /// Packages the registry could not yank.
        not_yanked: Vec<String>,
    },
}

impl RollbackOutcome {
    /// Whether nothing was done.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }
}

/// Undoes a release.
pub struct RollbackEngine {
    vcs: Arc<dyn Vcs>,
    forge: Arc<dyn Forge>,
    registry: Arc<dyn Registry>,
    tag_format: TagFormat,
    lock: Option<ReleaseLock>,
    record: Option<(PathBuf, Ecosystem)>,
    dry_run: bool,
}

impl RollbackEngine {
    /// Create an engine parsing tags with `tag_format`.
    #[must_use]
    pub fn new(
        vcs: Arc<dyn Vcs>,
        forge: Arc<dyn Forge>,
        registry: Arc<dyn Registry>,
        tag_format: TagFormat,
    ) -> Self {
        Self {
            vcs,
            forge,
            registry,
            tag_format,
            lock: None,
            record: None,
            dry_run: false,
        }
    }

    /// Hold `lock` for the duration of every non-dry rollback.
    #[must_use]
    pub fn with_lock(mut self, lock: ReleaseLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Record rolled-back versions in the manifest at `path`, creating it
    /// when missing.
    #[must_use]
    pub fn with_manifest_file(mut self, path: PathBuf, ecosystem: Ecosystem) -> Self {
        self.record = Some((path, ecosystem));
        self
    }

    /// Log mutations instead of performing them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Resolve the packages behind `tag`.
    #[must_use]
    pub fn resolve(
        &self,
        tag: &str,
        manifest: Option<&ReleaseManifest>,
    ) -> Vec<RolledBackPackage> {
        if let Some(manifest) = manifest {
            let entries: Vec<RolledBackPackage> = manifest
                .entries_for_tag(tag)
                .into_iter()
                .filter(|e| !matches!(e.status, PublishStatus::Failed | PublishStatus::DryRun))
                .map(|e| RolledBackPackage {
                    name: e.name.clone(),
                    version: e.version.clone(),
                    tag: e.tag.clone(),
                })
                .collect();
            if !entries.is_empty() {
                return entries;
            }
        }

        match self.tag_format.parse(tag) {
            Some((Some(name), version)) => vec![RolledBackPackage {
                name,
                version,
                tag: tag.to_string(),
            }],
            Some((None, _)) => {
                warn!(tag, "Tag names no package and the manifest does not record it");
                Vec::new()
            }
            None => {
                warn!(tag, format = %self.tag_format.0, "Tag does not match the tag format");
                Vec::new()
            }
        }
    }

    /// Roll back `tag`, yanking package versions when `yank` is set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Locked`] when another run holds the release
    /// lock, otherwise the first git, forge or registry error. Tags and
    /// releases are only deleted once every yank succeeded.
    pub async fn rollback(
        &self,
        tag: &str,
        manifest: Option<&ReleaseManifest>,
        yank: bool,
    ) -> Result<RollbackOutcome> {
        let _guard = match &self.lock {
            Some(lock) if !self.dry_run => Some(lock.acquire("rollback")?),
            _ => None,
        };

        let local = self.vcs.tag_exists(tag).await?;
        let remote = self.vcs.remote_tag_exists(tag).await?;
        if !local && !remote {
            info!(tag, "Tag not found locally or on the remote, nothing to roll back");
            return Ok(RollbackOutcome::NoOp { tag: tag.to_string() });
        }

        let packages = self.resolve(tag, manifest);

        let mut yanked = Vec::new();
        let mut not_yanked = Vec::new();
        if yank {
            let mut seen = BTreeSet::new();
            for package in &packages {
                if !seen.insert((package.name.as_str(), package.version.as_str())) {
                    continue;
                }
                let label = format!("{}@{}", package.name, package.version);
                if self.yank(tag, package).await? {
                    yanked.push(label);
                } else {
                    not_yanked.push(label);
                }
            }
        }

        let tags: BTreeSet<String> = std::iter::once(tag.to_string())
            .chain(packages.iter().map(|p| p.tag.clone()))
            .collect();
        let mut deleted_tags = Vec::new();
        let mut deleted_releases = Vec::new();
        for t in &tags {
            if self.delete_release(t).await? {
                deleted_releases.push(t.clone());
            }
            if self.delete_tag(t).await? {
                deleted_tags.push(t.clone());
            }
        }

        self.record_rollback(&packages).await?;

        Ok(RollbackOutcome::RolledBack {
            tag: tag.to_string(),
            packages,
            deleted_tags,
            deleted_releases,
            yanked,
            not_yanked,
        })
    }

    async fn yank(&self, tag: &str, package: &RolledBackPackage) -> Result<bool> {
        if self.dry_run {
            info!(package = %package.name, version = %package.version, "Dry run: would yank");
            return Ok(true);
        }
        let reason = format!("rolled back release {tag}");
        let registry = self.registry.name();
        if self
            .registry
            .yank(&package.name, &package.version, Some(&reason))
            .await?
        {
            info!(package = %package.name, version = %package.version, registry, "Yanked");
            Ok(true)
        } else {
            warn!(registry, package = %package.name, "Registry does not support yanking");
            Ok(false)
        }
    }

    async fn delete_tag(&self, tag: &str) -> Result<bool> {
        let local = self.vcs.tag_exists(tag).await?;
        let remote = self.vcs.remote_tag_exists(tag).await?;
        if !local && !remote {
            return Ok(false);
        }
        if self.dry_run {
            info!(tag, local, remote, "Dry run: would delete tag");
            return Ok(true);
        }
        if remote {
            self.vcs.delete_remote_tag(tag).await?;
        }
        if local {
            self.vcs.delete_tag(tag).await?;
        }
        info!(tag, local, remote, "Deleted tag");
        Ok(true)
    }

    async fn delete_release(&self, tag: &str) -> Result<bool> {
        if !can(self.forge.as_ref(), Capability::Releases, "delete_release")
            || !self.forge.release_exists(tag).await?
        {
            return Ok(false);
        }
        if self.dry_run {
            info!(tag, "Dry run: would delete forge release");
            return Ok(true);
        }
        self.forge.delete_release(tag).await?;
        info!(tag, forge = self.forge.name(), "Deleted forge release");
        Ok(true)
    }

    async fn record_rollback(&self, packages: &[RolledBackPackage]) -> Result<()> {
        let Some((path, ecosystem)) = &self.record else {
            return Ok(());
        };
        if self.dry_run || packages.is_empty() {
            return Ok(());
        }
        let mut manifest = match ReleaseManifest::read(path)? {
            Some(manifest) => manifest,
            None => ReleaseManifest::empty(self.vcs.head_sha().await?),
        };
        manifest.mark_rolled_back(packages, *ecosystem);
        manifest.write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::{FakeForge, FakeRegistry, FakeVcs};
    use crate::backends::{Forge, ReleaseDraft};
    use crate::error::Error;
    use crate::manifest::ManifestEntry;
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        vcs: Arc<FakeVcs>,
        forge: Arc<FakeForge>,
        registry: Arc<FakeRegistry>,
        engine: RollbackEngine,
    }

    fn fixture() -> Fixture {
        let vcs = Arc::new(FakeVcs::new());
        let forge = Arc::new(FakeForge::new());
        let registry = Arc::new(FakeRegistry::new("pypi"));
        let engine = RollbackEngine::new(
            vcs.clone(),
            forge.clone(),
            registry.clone(),
            TagFormat::default(),
        );
        Fixture {
            vcs,
            forge,
            registry,
            engine,
        }
    }

    fn entry(name: &str, version: &str, status: PublishStatus) -> ManifestEntry {
        ManifestEntry {
            name: name.to_string(),
            ecosystem: Ecosystem::Python,
            version: version.to_string(),
            tag: format!("{name}-v{version}"),
            status,
            checksum: None,
        }
    }

    #[tokio::test]
    async fn test_rollback_from_tag_then_noop() {
        let f = fixture();
        f.vcs.commit("a1", "feat: x", &["core/a.py"]);
        f.vcs.seed_tag("core-v1.1.0");
        f.registry.seed_version("core", "1.1.0");
        f.forge
            .create_release(&ReleaseDraft {
                tag: "core-v1.1.0".to_string(),
                title: "core 1.1.0".to_string(),
                notes: String::new(),
                prerelease: false,
            })
            .await
            .unwrap();

        let outcome = f.engine.rollback("core-v1.1.0", None, true).await.unwrap();
        let RollbackOutcome::RolledBack {
            packages,
            deleted_tags,
            deleted_releases,
            yanked,
            ..
        } = outcome
        else {
            panic!("expected a rollback");
        };
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "core");
        assert_eq!(deleted_tags, vec!["core-v1.1.0"]);
        assert_eq!(deleted_releases, vec!["core-v1.1.0"]);
        assert_eq!(yanked, vec!["core@1.1.0"]);
        assert!(f.vcs.tags().is_empty());
        assert!(f.vcs.remote_tags().is_empty());
        assert!(f.forge.releases().is_empty());
        assert!(f.registry.is_yanked("core", "1.1.0"));

        let again = f.engine.rollback("core-v1.1.0", None, true).await.unwrap();
        assert!(again.is_noop());
        assert_eq!(f.registry.calls.count("yank"), 1);
    }

    #[tokio::test]
    async fn test_umbrella_tag_uses_manifest() {
        let f = fixture();
        f.vcs.commit("a1", "feat: x", &[]);
        for tag in ["v2.0.0", "core-v2.0.0", "plugin-v0.3.0"] {
            f.vcs.seed_tag(tag);
        }
        let manifest = ReleaseManifest {
            schema_version: 1,
            created_at: Utc::now(),
            git_sha: "a1".to_string(),
            umbrella_tag: Some("v2.0.0".to_string()),
            packages: vec![
                entry("core", "2.0.0", PublishStatus::Published),
                entry("plugin", "0.3.0", PublishStatus::Published),
                entry("broken", "1.0.0", PublishStatus::Failed),
            ],
        };

        let outcome = f.engine.rollback("v2.0.0", Some(&manifest), false).await.unwrap();
        let RollbackOutcome::RolledBack { packages, yanked, .. } = outcome else {
            panic!("expected a rollback");
        };
        assert_eq!(packages.len(), 2);
        assert!(yanked.is_empty());
        assert!(f.vcs.tags().is_empty());
        assert_eq!(f.registry.calls.count("yank"), 0);
    }

    #[tokio::test]
    async fn test_unsupported_yank_reported() {
        let vcs = Arc::new(FakeVcs::new());
        let registry = Arc::new(FakeRegistry::new("go-proxy").without_yank());
        let engine = RollbackEngine::new(
            vcs.clone(),
            Arc::new(FakeForge::new()),
            registry,
            TagFormat::default(),
        );
        vcs.commit("a1", "fix: y", &[]);
        vcs.seed_tag("mod-v0.1.1");

        let outcome = engine.rollback("mod-v0.1.1", None, true).await.unwrap();
        let RollbackOutcome::RolledBack { not_yanked, .. } = outcome else {
            panic!("expected a rollback");
        };
        assert_eq!(not_yanked, vec!["mod@0.1.1"]);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let f = fixture();
        let engine = RollbackEngine::new(
            f.vcs.clone(),
            f.forge.clone(),
            f.registry.clone(),
            TagFormat::default(),
        )
        .with_dry_run(true);
        f.vcs.commit("a1", "fix: y", &[]);
        f.vcs.seed_tag("core-v1.0.1");

        let outcome = engine.rollback("core-v1.0.1", None, true).await.unwrap();
        assert!(!outcome.is_noop());
        assert!(f.vcs.tags().contains("core-v1.0.1"));
        assert_eq!(f.registry.calls.count("yank"), 0);
    }

    #[tokio::test]
    async fn test_failed_yank_keeps_tag_for_rerun() {
        let f = fixture();
        f.vcs.commit("a1", "feat: x", &[]);
        f.vcs.seed_tag("core-v1.2.0");
        f.registry.seed_version("core", "1.2.0");
        f.registry.fail_yank(1);

        let err = f.engine.rollback("core-v1.2.0", None, true).await.unwrap_err();
        assert!(err.is_transient());
        assert!(f.vcs.tags().contains("core-v1.2.0"));
        assert!(f.vcs.remote_tags().contains("core-v1.2.0"));
        assert!(!f.registry.is_yanked("core", "1.2.0"));

        let outcome = f.engine.rollback("core-v1.2.0", None, true).await.unwrap();
        let RollbackOutcome::RolledBack { yanked, deleted_tags, .. } = outcome else {
            panic!("expected a rollback");
        };
        assert_eq!(yanked, vec!["core@1.2.0"]);
        assert_eq!(deleted_tags, vec!["core-v1.2.0"]);
        assert!(f.registry.is_yanked("core", "1.2.0"));
        assert!(f.vcs.tags().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_refused_while_locked() {
        let temp = TempDir::new().unwrap();
        let f = fixture();
        let lock = ReleaseLock::new(temp.path());
        let engine = RollbackEngine::new(
            f.vcs.clone(),
            f.forge.clone(),
            f.registry.clone(),
            TagFormat::default(),
        )
        .with_lock(lock.clone());
        f.vcs.commit("a1", "fix: y", &[]);
        f.vcs.seed_tag("core-v1.0.1");

        let held = lock.acquire("publish").unwrap();
        let err = engine.rollback("core-v1.0.1", None, true).await.unwrap_err();
        assert!(matches!(err, Error::Locked { .. }));
        assert!(f.vcs.tags().contains("core-v1.0.1"));
        assert_eq!(f.registry.calls.count("yank"), 0);

        drop(held);
        assert!(!engine.rollback("core-v1.0.1", None, true).await.unwrap().is_noop());
        assert!(lock.holder().is_none());
    }

    #[tokio::test]
    async fn test_rollback_recorded_in_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dist/release-manifest.json");
        let f = fixture();
        let engine = RollbackEngine::new(
            f.vcs.clone(),
            f.forge.clone(),
            f.registry.clone(),
            TagFormat::default(),
        )
        .with_manifest_file(path.clone(), Ecosystem::Python);
        f.vcs.commit("a1", "fix: y", &[]);
        f.vcs.seed_tag("core-v1.0.1");

        engine.rollback("core-v1.0.1", None, false).await.unwrap();
        let manifest = ReleaseManifest::read(&path).unwrap().unwrap();
        assert_eq!(manifest.git_sha, "a1");
        assert!(manifest.is_rolled_back("core", "1.0.1"));
    }
}
