//! Publish pipeline.
//!
//! Packages are published level by level. Within a level each package runs
//! its own stage sequence concurrently with its siblings:
//!
//! ```text
//! version_exists? ──yes──▶ skipped-already-exists ──▶ tag
//!        │no
//!        ▼
//!       pin ─▶ build ─▶ publish (retried) ─▶ poll ─▶ smoke test ─▶ verify ─▶ restore ─▶ tag
//! ```
//!
//! Stage failures end up in that package's [`PublishResult`]; they never
//! abort siblings. A failed level stops later levels unless `force` is set,
//! and the packages that never started are reported as blocked.

use crate::backends::{Capability, Forge, PackageManager, Registry, ReleaseDraft, Vcs, can};
use crate::checksum::{combined, sha256_artifacts, verify};
use crate::config::PublishSettings;
use crate::error::{Error, Result};
use crate::pin::{self, EphemeralPin};
use crate::retry::RetryPolicy;
use futures::StreamExt;
use releasekit_workspaces::{Ecosystem, Package, WorkspaceBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound for automatically sized in-level concurrency.
pub const MAX_AUTO_CONCURRENCY: usize = 8;

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Packages in flight per level; 0 sizes automatically.
    pub concurrency: usize,
    /// Publish retry policy.
    pub retry: RetryPolicy,
    /// Build timeout.
    pub build_timeout: Duration,
    /// Timeout per publish attempt.
    pub publish_timeout: Duration,
    /// Registry visibility timeout.
    pub poll_timeout: Duration,
    /// Delay between visibility polls.
    pub poll_interval: Duration,
    /// Run smoke tests after polling.
    pub smoke_test: bool,
    /// Create forge releases next to tags.
    pub create_releases: bool,
    /// Perform read-only checks only.
    pub dry_run: bool,
    /// Keep going after a failed level.
    pub force: bool,
    /// Build output directory; one subdirectory per package.
    pub dist_dir: PathBuf,
}

impl PublishConfig {
    /// Settings from the `[publish]` table, building into `dist_dir`.
    #[must_use]
    pub fn from_settings(settings: &PublishSettings, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: settings.concurrency,
            retry: RetryPolicy::from_settings(settings),
            build_timeout: Duration::from_secs(settings.build_timeout_secs),
            publish_timeout: Duration::from_secs(settings.publish_timeout_secs),
            poll_timeout: Duration::from_secs(settings.poll_timeout_secs),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            smoke_test: settings.smoke_test,
            create_releases: settings.create_releases,
            dry_run: false,
            force: false,
            dist_dir: dist_dir.into(),
        }
    }

    /// Concurrency for a level of `level_size` packages.
    #[must_use]
    pub fn effective_concurrency(&self, level_size: usize) -> usize {
        let width = if self.concurrency == 0 {
            level_size.min(MAX_AUTO_CONCURRENCY)
        } else {
            self.concurrency
        };
        width.max(1)
    }
}

/// One package to publish.
#[derive(Debug, Clone)]
pub struct PublishItem {
    /// The package, carrying the version to publish.
    pub package: Package,
    /// Tag to create once the version is on the registry.
    pub tag: String,
    /// Internal dependency name to exact version, applied while publishing.
    pub pins: BTreeMap<String, String>,
}

/// Outcome of one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStatus {
    /// Uploaded and verified by this run.
    Published,
    /// The registry already had this version; nothing was uploaded.
    SkippedAlreadyExists,
    /// A stage failed.
    Failed,
    /// Dry run: nothing was mutated.
    DryRun,
    /// Released once, then rolled back. Publish leaves it alone.
    RolledBack,
}

impl PublishStatus {
    /// Whether the version is on the registry after this run.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Published | Self::SkippedAlreadyExists | Self::DryRun)
    }

    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::SkippedAlreadyExists => "skipped-already-exists",
            Self::Failed => "failed",
            Self::DryRun => "dry-run",
            Self::RolledBack => "rolled-back",
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-package result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Package name.
    pub package: String,
    /// Ecosystem.
    pub ecosystem: Ecosystem,
    /// Version handled.
    pub version: String,
    /// Tag for this version.
    pub tag: String,
    /// Outcome.
    pub status: PublishStatus,
    /// Publish attempts made.
    pub attempts: u32,
    /// Combined SHA-256 of the built artifacts.
    pub checksum: Option<String>,
    /// Failure description.
    pub error: Option<String>,
    /// Non-fatal problems (unconfirmed visibility, tagging failures).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PublishResult {
    fn new(item: &PublishItem, status: PublishStatus) -> Self {
        Self {
            package: item.package.name.clone(),
            ecosystem: item.package.ecosystem,
            version: item.package.version.clone(),
            tag: item.tag.clone(),
            status,
            attempts: 0,
            checksum: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    fn fail(mut self, error: &Error) -> Self {
        self.status = PublishStatus::Failed;
        self.error = Some(error.to_string());
        self
    }
}

/// End-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Results in level order, sorted by name within a level.
    pub results: Vec<PublishResult>,
    /// Packages never started because an earlier level failed.
    pub blocked: Vec<String>,
}

impl PublishReport {
    /// Failed results.
    pub fn failed(&self) -> impl Iterator<Item = &PublishResult> {
        self.results.iter().filter(|r| r.status == PublishStatus::Failed)
    }

    /// Whether every package succeeded and none were blocked.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.blocked.is_empty() && self.failed().next().is_none()
    }

    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Number of results with `status`.
    #[must_use]
    pub fn count(&self, status: PublishStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Result for `package`.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&PublishResult> {
        self.results.iter().find(|r| r.package == package)
    }
}

/// Drives the publish stages against the backend traits.
pub struct PublishPipeline {
    package_manager: Arc<dyn PackageManager>,
    registry: Arc<dyn Registry>,
    vcs: Arc<dyn Vcs>,
    forge: Arc<dyn Forge>,
    workspace: Arc<dyn WorkspaceBackend>,
    config: PublishConfig,
}

impl PublishPipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(
        package_manager: Arc<dyn PackageManager>,
        registry: Arc<dyn Registry>,
        vcs: Arc<dyn Vcs>,
        forge: Arc<dyn Forge>,
        workspace: Arc<dyn WorkspaceBackend>,
        config: PublishConfig,
    ) -> Self {
        Self {
            package_manager,
            registry,
            vcs,
            forge,
            workspace,
            config,
        }
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish `levels` in order.
    ///
    /// Per-package failures are reported in the returned [`PublishReport`].
    /// An `Err` is returned only before anything was mutated, when a
    /// manifest left pinned by an interrupted run cannot be restored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from manifest recovery.
    pub async fn run(&self, levels: Vec<Vec<PublishItem>>) -> Result<PublishReport> {
        if !self.config.dry_run {
            for item in levels.iter().flatten() {
                pin::recover(&item.package.manifest_path)?;
            }
        }

        let mut report = PublishReport::default();
        let mut halted = false;

        for (index, level) in levels.into_iter().enumerate() {
            if halted {
                report.blocked.extend(level.into_iter().map(|i| i.package.name));
                continue;
            }

            let width = self.config.effective_concurrency(level.len());
            info!(level = index, packages = level.len(), concurrency = width, "Publishing level");

            let mut results: Vec<PublishResult> =
                futures::stream::iter(level.iter().map(|item| self.publish_one(item)))
                    .buffer_unordered(width)
                    .collect()
                    .await;
            results.sort_by(|a, b| a.package.cmp(&b.package));

            let failed = results.iter().filter(|r| r.status == PublishStatus::Failed).count();
            report.results.extend(results);

            if failed > 0 {
                if self.config.force {
                    warn!(
                        level = index,
                        failed,
                        "Level had failures, continuing because of --force"
                    );
                } else {
                    error!(level = index, failed, "Level had failures, not starting later levels");
                    halted = true;
                }
            }
        }

        info!(
            published = report.count(PublishStatus::Published),
            skipped = report.count(PublishStatus::SkippedAlreadyExists),
            failed = report.failed().count(),
            blocked = report.blocked.len(),
            "Publish finished"
        );
        Ok(report)
    }

    async fn publish_one(&self, item: &PublishItem) -> PublishResult {
        let name = &item.package.name;
        let version = &item.package.version;

        match self.registry.version_exists(name, version).await {
            Ok(true) => {
                info!(
                    package = %name,
                    version = %version,
                    "Version already on registry, skipping upload"
                );
                let mut result = PublishResult::new(item, PublishStatus::SkippedAlreadyExists);
                self.ensure_tag(item, &mut result).await;
                return result;
            }
            Ok(false) => {}
            Err(e) => warn!(package = %name, error = %e, "Could not check registry, continuing"),
        }

        if self.config.dry_run {
            info!(
                package = %name,
                version = %version,
                pins = item.pins.len(),
                "Dry run: would publish"
            );
            return PublishResult::new(item, PublishStatus::DryRun);
        }

        let mut result = PublishResult::new(item, PublishStatus::Published);
        let manifest = &item.package.manifest_path;
        let pin = match EphemeralPin::apply(self.workspace.as_ref(), manifest, &item.pins) {
            Ok(pin) => pin,
            Err(e) => {
                error!(package = %name, error = %e, "Failed to pin dependencies");
                return result.fail(&e);
            }
        };

        let outcome = self.build_and_publish(item, &mut result).await;

        if let Err(e) = pin.restore() {
            error!(package = %name, error = %e, "Failed to restore manifest");
            return result.fail(&e);
        }

        match outcome {
            Ok(()) => {
                info!(package = %name, version = %version, attempts = result.attempts, "Published");
                self.ensure_tag(item, &mut result).await;
                result
            }
            Err(e) => {
                error!(package = %name, version = %version, error = %e, "Publish failed");
                result.fail(&e)
            }
        }
    }

    async fn build_and_publish(
        &self,
        item: &PublishItem,
        result: &mut PublishResult,
    ) -> Result<()> {
        let package = &item.package;
        let pm = &self.package_manager;
        let out_dir = self.config.dist_dir.join(&package.name);

        debug!(package = %package.name, out_dir = %out_dir.display(), "Building");
        let build = timed("build", self.config.build_timeout, pm.build(package, &out_dir)).await?;
        if !build.success {
            return Err(Error::backend(pm.name(), format!("build failed: {}", build.summary())));
        }
        let local = sha256_artifacts(&build.artifacts)?;
        result.checksum = combined(&local);

        self.publish_with_retry(package, &build.artifacts, result).await?;

        let visible = self
            .registry
            .poll_version(
                &package.name,
                &package.version,
                self.config.poll_timeout,
                self.config.poll_interval,
            )
            .await
            .unwrap_or(false);
        if !visible {
            let message = format!(
                "{}@{} not visible on {} after {}s",
                package.name,
                package.version,
                self.registry.name(),
                self.config.poll_timeout.as_secs()
            );
            warn!(package = %package.name, "{message}");
            result.warnings.push(message);
        }

        if self.config.smoke_test {
            let smoke = pm.smoke_test(package, &package.version).await?;
            if !smoke.success {
                return Err(Error::backend(
                    pm.name(),
                    format!("smoke test failed: {}", smoke.summary()),
                ));
            }
        }

        if visible {
            let remote = self.registry.checksums(&package.name, &package.version).await?;
            verify(&package.name, &local, &remote)?;
        }
        Ok(())
    }

    async fn publish_with_retry(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        result: &mut PublishResult,
    ) -> Result<()> {
        let pm = &self.package_manager;
        let attempts = AtomicU32::new(0);
        let operation = format!("publish {}", package.name);
        let outcome = self
            .config
            .retry
            .run(&operation, |attempt| {
                let attempts = &attempts;
                async move {
                    if attempt > 1
                        && matches!(
                            self.registry
                                .version_exists(&package.name, &package.version)
                                .await,
                            Ok(true)
                        )
                    {
                        info!(
                            package = %package.name,
                            attempt,
                            "An earlier attempt reached the registry"
                        );
                        return Ok(());
                    }
                    attempts.store(attempt, Ordering::Relaxed);
                    let publish = pm.publish(package, artifacts, false);
                    match timed("publish", self.config.publish_timeout, publish).await {
                        Ok(out) if out.success => Ok(()),
                        Ok(out) => Err(Error::backend(pm.name(), out.summary())),
                        Err(e) => Err(e),
                    }
                }
            })
            .await;
        result.attempts = attempts.into_inner();
        outcome
    }

    async fn ensure_tag(&self, item: &PublishItem, result: &mut PublishResult) {
        if self.config.dry_run {
            if matches!(self.vcs.tag_exists(&item.tag).await, Ok(false)) {
                info!(tag = %item.tag, "Dry run: would create tag");
            }
            return;
        }
        if let Err(e) = self.tag_and_release(item).await {
            warn!(package = %item.package.name, tag = %item.tag, error = %e, "Tagging failed");
            result.warnings.push(format!("tag {}: {e}", item.tag));
        }
    }

    async fn tag_and_release(&self, item: &PublishItem) -> Result<()> {
        if self.vcs.tag_exists(&item.tag).await? {
            debug!(tag = %item.tag, "Tag already present");
            return Ok(());
        }
        let message = format!("Release {} {}", item.package.name, item.package.version);
        self.vcs.create_tag(&item.tag, &message, None).await?;
        self.vcs.push_tags(std::slice::from_ref(&item.tag)).await?;
        info!(tag = %item.tag, "Created tag");

        if self.config.create_releases
            && can(self.forge.as_ref(), Capability::Releases, "create_release")
            && !self.forge.release_exists(&item.tag).await?
        {
            self.forge
                .create_release(&ReleaseDraft {
                    tag: item.tag.clone(),
                    title: format!("{} {}", item.package.name, item.package.version),
                    notes: message,
                    prerelease: is_prerelease(&item.package.version),
                })
                .await?;
        }
        Ok(())
    }
}

/// Whether a version string carries a prerelease marker under SemVer or
/// PEP 440.
#[must_use]
pub fn is_prerelease(version: &str) -> bool {
    let version = version.split('+').next().unwrap_or(version);
    version.contains('-')
        || version.contains(".dev")
        || version
            .char_indices()
            .any(|(i, c)| {
                c.is_ascii_alphabetic() && version[..i].ends_with(|p: char| p.is_ascii_digit())
            })
}

async fn timed<T>(
    operation: &str,
    limit: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        })?
}

/// Exact-version pins for `package`'s internal dependencies, taken from
/// `versions` (package name to version being released or current).
#[must_use]
pub fn pins_for(
    package: &Package,
    versions: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    package
        .dependencies
        .iter()
        .filter_map(|dep| versions.get(dep).map(|v| (dep.clone(), v.clone())))
        .collect()
}

/// Default build output directory under `root`.
#[must_use]
pub fn default_dist_dir(root: &Path) -> PathBuf {
    root.join(".releasekit").join("dist")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_concurrency() {
        let mut config = PublishConfig::from_settings(&PublishSettings::default(), "dist");
        assert_eq!(config.effective_concurrency(3), 3);
        assert_eq!(config.effective_concurrency(20), MAX_AUTO_CONCURRENCY);
        assert_eq!(config.effective_concurrency(0), 1);
        config.concurrency = 2;
        assert_eq!(config.effective_concurrency(20), 2);
    }

    #[test]
    fn test_is_prerelease() {
        assert!(is_prerelease("1.0.0-rc.1"));
        assert!(is_prerelease("1.0.0rc1"));
        assert!(is_prerelease("1.0.0a2"));
        assert!(is_prerelease("1.0.0.dev3"));
        assert!(!is_prerelease("1.0.0"));
        assert!(!is_prerelease("1.0.0.post1"));
        assert!(!is_prerelease("1.0.0+build.5"));
        assert!(!is_prerelease("2026.10.1"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PublishStatus::SkippedAlreadyExists).unwrap();
        assert_eq!(json, "\"skipped-already-exists\"");
        assert_eq!(PublishStatus::DryRun.to_string(), "dry-run");
    }

    #[test]
    fn test_pins_for() {
        let package = Package::new("app", "1.0.0", "app", "app/Cargo.toml", Ecosystem::Rust)
            .with_dependency("core")
            .with_dependency("util");
        let versions = BTreeMap::from([
            ("core".to_string(), "2.0.0".to_string()),
            ("other".to_string(), "9.9.9".to_string()),
        ]);
        assert_eq!(
            pins_for(&package, &versions),
            BTreeMap::from([("core".to_string(), "2.0.0".to_string())])
        );
    }
}
