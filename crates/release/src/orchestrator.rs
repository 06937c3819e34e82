//! Release orchestrator.
//!
//! Ties discovery, commit analysis, planning and the publish pipeline to the
//! backends for one configured workspace. The three mutating flows are:
//!
//! - [`ReleaseOrchestrator::prepare`]: bump versions on a release branch and
//!   open (or refresh) a pull request labelled [`PENDING_LABEL`] whose body
//!   embeds the plan.
//! - [`ReleaseOrchestrator::release`]: once that pull request is merged, tag
//!   every planned package (and the umbrella tag), create forge releases,
//!   relabel the pull request [`TAGGED_LABEL`] and consume changesets.
//! - [`ReleaseOrchestrator::publish`]: publish every package at its manifest
//!   version and write the release manifest.
//!
//! Each flow holds the release lock and is safe to re-run.

use crate::backends::{
    Capability, Forge, PackageManager, PrState, PullRequestDraft, Registry, ReleaseDraft, Vcs, can,
};
use crate::changeset::{BumpType, ChangesetStore};
use crate::commit_analyzer::{CommitAnalyzer, PackageWindow, direct_bumps};
use crate::config::{ReleaseConfig, TagFormat, WorkspaceConfig};
use crate::error::{Error, Result};
use crate::lock::{LockGuard, ReleaseLock};
use crate::manifest::ReleaseManifest;
use crate::pipeline::{
    PublishConfig, PublishItem, PublishPipeline, PublishReport, default_dist_dir, is_prerelease,
    pins_for,
};
use crate::planner::{PlanOptions, PlanReason, ReleasePlan, ReleasePlanEntry, highest_version, plan};
use chrono::NaiveDate;
use releasekit_graph::PackageGraph;
use releasekit_workspaces::{Package, PackageFilter, WorkspaceBackend};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Label on release pull requests awaiting merge.
pub const PENDING_LABEL: &str = "autorelease: pending";

/// Label on release pull requests whose tags exist.
pub const TAGGED_LABEL: &str = "autorelease: tagged";

const PLAN_MARKER_START: &str = "<!-- releasekit:plan";
const PLAN_MARKER_END: &str = "-->";

/// Release branch for a workspace label.
#[must_use]
pub fn release_branch(workspace: &str) -> String {
    format!("releasekit--release--{workspace}")
}

/// Settings for one workspace run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Workspace label from `releasekit.toml`.
    pub label: String,
    /// Repository root.
    pub repo_root: PathBuf,
    /// The workspace's configuration.
    pub workspace: WorkspaceConfig,
    /// Branch release pull requests target.
    pub default_branch: String,
    /// Absolute changeset directory.
    pub changeset_dir: PathBuf,
    /// Absolute manifest artifact path.
    pub manifest_path: PathBuf,
    /// Groups to restrict the run to; empty selects everything.
    pub groups: Vec<String>,
    /// Bump every package by this much.
    pub forced_bump: Option<BumpType>,
    /// Prerelease label.
    pub prerelease: Option<String>,
    /// Perform read-only steps only.
    pub dry_run: bool,
    /// Publish pipeline settings.
    pub publish: PublishConfig,
    /// Date used by CalVer; today when unset.
    pub today: Option<NaiveDate>,
}

impl OrchestratorConfig {
    /// Settings for workspace `label` of `config`, rooted at `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label.
    pub fn new(config: &ReleaseConfig, label: &str, repo_root: &Path) -> Result<Self> {
        let workspace = config.workspace(label)?.clone();
        Ok(Self {
            label: label.to_string(),
            repo_root: repo_root.to_path_buf(),
            workspace,
            default_branch: config.default_branch.clone(),
            changeset_dir: repo_root.join(&config.changeset_dir),
            manifest_path: config.manifest_file(repo_root),
            groups: Vec::new(),
            forced_bump: None,
            prerelease: None,
            dry_run: false,
            publish: PublishConfig::from_settings(
                &config.publish,
                default_dist_dir(repo_root).join(label),
            ),
            today: None,
        })
    }

    /// Restrict the run to `groups`.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Override computed bumps.
    #[must_use]
    pub const fn with_forced_bump(mut self, bump: Option<BumpType>) -> Self {
        self.forced_bump = bump;
        self
    }

    /// Release prerelease versions labelled `label`.
    #[must_use]
    pub fn with_prerelease(mut self, label: Option<String>) -> Self {
        self.prerelease = label;
        self
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.publish.dry_run = dry_run;
        self
    }

    /// Keep publishing after a failed level.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.publish.force = force;
        self
    }

    /// Pin the CalVer date.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Absolute workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.repo_root.join(&self.workspace.root)
    }

    /// Repository-relative directory of `package`.
    #[must_use]
    pub fn package_dir(&self, package: &Package) -> PathBuf {
        Path::new(&self.workspace.root)
            .join(&package.path)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
}

/// The backends a workspace run drives.
#[derive(Clone)]
pub struct Backends {
    /// Discovery and manifest rewriting.
    pub workspace: Arc<dyn WorkspaceBackend>,
    /// Git.
    pub vcs: Arc<dyn Vcs>,
    /// Code forge.
    pub forge: Arc<dyn Forge>,
    /// Package registry.
    pub registry: Arc<dyn Registry>,
    /// Build and publish tool.
    pub package_manager: Arc<dyn PackageManager>,
}

/// Outcome of [`ReleaseOrchestrator::prepare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    /// The plan the branch implements; empty when nothing is due.
    pub plan: ReleasePlan,
    /// Release branch.
    pub branch: String,
    /// Release pull request number, when a forge is configured.
    pub pull_request: Option<u64>,
}

/// Outcome of [`ReleaseOrchestrator::release`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Merged release pull request, if one was pending.
    pub pull_request: Option<u64>,
    /// Tags created by this run.
    pub tags_created: Vec<String>,
    /// Tags that already existed.
    pub tags_existing: Vec<String>,
    /// Forge releases created.
    pub releases_created: Vec<String>,
    /// Changeset files removed.
    pub changesets_consumed: usize,
}

/// Drives one workspace through prepare, release and publish.
pub struct ReleaseOrchestrator {
    config: OrchestratorConfig,
    backends: Backends,
}

impl ReleaseOrchestrator {
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(config: OrchestratorConfig, backends: Backends) -> Self {
        Self { config, backends }
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn lock(&self, operation: &str) -> Result<Option<LockGuard>> {
        if self.config.dry_run {
            return Ok(None);
        }
        ReleaseLock::new(&self.config.repo_root).acquire(operation).map(Some)
    }

    /// Discover the workspace's packages, filtered by groups and exclusions.
    ///
    /// # Errors
    ///
    /// Returns a workspace error for unreadable manifests, invalid patterns
    /// or unknown groups.
    pub fn discover(&self) -> Result<Vec<Package>> {
        let ws = &self.config.workspace;
        let root = self.config.workspace_root();
        let packages = self.backends.workspace.discover(&root)?;
        let filter = PackageFilter::new(&ws.groups, &ws.exclude, &ws.exclude_publish)?;
        let packages = filter.apply(packages, &self.config.groups)?;
        debug!(workspace = %self.config.label, packages = packages.len(), "Discovered packages");
        Ok(packages)
    }

    /// Dependency graph of the discovered packages.
    ///
    /// # Errors
    ///
    /// Returns discovery errors.
    pub fn graph(&self) -> Result<PackageGraph<Package>> {
        Ok(build_graph(&self.discover()?))
    }

    fn plan_options(&self, packages: &[Package]) -> Result<PlanOptions> {
        let ws = &self.config.workspace;
        let mut options = PlanOptions {
            forced_bump: self.config.forced_bump,
            prerelease: self.config.prerelease.clone(),
            propagation: ws.propagation,
            default_scheme: ws.default_scheme()?,
            default_tag_format: TagFormat::new(&ws.tag_format)?,
            umbrella_tag: ws.umbrella_format(),
            ..PlanOptions::default()
        };
        if let Some(today) = self.config.today {
            options.today = today;
        }
        for package in packages {
            let name = &package.name;
            if !ws.packages.contains_key(name) {
                continue;
            }
            options.schemes.insert(name.clone(), ws.scheme_for(name)?);
            options.tag_formats.insert(name.clone(), ws.tag_format_for(name));
            if ws.is_skipped(name) {
                options.skip.insert(name.clone());
            }
        }
        Ok(options)
    }

    /// Compute the release plan from history and changesets.
    ///
    /// # Errors
    ///
    /// Returns discovery, git, changeset, graph or version errors.
    pub async fn plan(&self) -> Result<ReleasePlan> {
        let packages = self.discover()?;
        let options = self.plan_options(&packages)?;
        let parser = self.config.workspace.parser()?;
        let analyzer = CommitAnalyzer::new(self.backends.vcs.as_ref(), parser.as_ref());

        let mut windows = Vec::with_capacity(packages.len());
        for package in &packages {
            let tag = options
                .tag_format_for(&package.name)
                .render(&package.name, &package.version);
            windows.push(PackageWindow {
                name: package.name.clone(),
                path: self.config.package_dir(package),
                since: analyzer.since_tag(&tag).await?,
            });
        }
        let commits = analyzer.analyze(&windows).await?;

        let store = ChangesetStore::new(&self.config.changeset_dir);
        let names: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let changesets: BTreeMap<_, _> = ChangesetStore::package_bumps(&store.list()?)
            .into_iter()
            .filter(|(name, _)| {
                let known = names.contains(name.as_str());
                if !known {
                    debug!(
                        package = %name,
                        workspace = %self.config.label,
                        "Changeset names a package outside this workspace"
                    );
                }
                known
            })
            .collect();

        let direct = direct_bumps(&commits, &changesets);
        let plan = plan(&build_graph(&packages), &direct, &options)?;
        info!(workspace = %self.config.label, entries = plan.entries.len(), "Planned release");
        Ok(plan)
    }

    /// Bump versions on the release branch and open or update the release
    /// pull request.
    ///
    /// # Errors
    ///
    /// Returns planning errors, a configuration error for a dirty working
    /// tree, and git or forge errors.
    pub async fn prepare(&self) -> Result<PrepareReport> {
        let _lock = self.lock("prepare")?;
        let plan = self.plan().await?;
        let branch = release_branch(&self.config.label);
        let mut report = PrepareReport {
            plan,
            branch,
            pull_request: None,
        };
        if report.plan.is_empty() {
            info!(workspace = %self.config.label, "Nothing to release");
            return Ok(report);
        }

        let vcs = &self.backends.vcs;
        if !vcs.is_clean().await? {
            return Err(Error::config(
                "working tree has uncommitted changes",
                "Commit or stash changes before preparing a release",
            ));
        }

        if self.config.dry_run {
            for entry in &report.plan.entries {
                info!(
                    package = %entry.package,
                    from = %entry.current_version,
                    to = %entry.new_version,
                    "Dry run: would bump"
                );
            }
            info!(
                branch = %report.branch,
                "Dry run: would commit, push and open the release pull request"
            );
            return Ok(report);
        }

        vcs.checkout_new_branch(&report.branch).await?;
        let packages: BTreeMap<String, Package> = self
            .discover()?
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        for entry in &report.plan.entries {
            let package = packages
                .get(&entry.package)
                .ok_or_else(|| Error::package_not_found(&entry.package))?;
            self.bump_version(package, &entry.new_version).await?;
        }

        let pm = &self.backends.package_manager;
        match pm.lock(&self.config.workspace_root()).await {
            Ok(out) if out.success => debug!(tool = pm.name(), "Refreshed lock file"),
            Ok(out) => warn!(tool = pm.name(), output = %out.summary(), "Lock refresh failed"),
            Err(e) => warn!(tool = pm.name(), error = %e, "Lock refresh failed"),
        }

        let title = release_title(&self.config.label, &report.plan);
        vcs.commit_all(&title).await?;
        vcs.push_branch(&report.branch, true).await?;
        report.pull_request = self.upsert_pull_request(&report.plan, &report.branch, &title).await?;
        Ok(report)
    }

    async fn bump_version(&self, package: &Package, version: &str) -> Result<()> {
        let pm = &self.backends.package_manager;
        match pm.version_bump(package, version).await {
            Ok(out) if out.success => {
                debug!(package = %package.name, version, tool = pm.name(), "Bumped version");
                return Ok(());
            }
            Ok(out) => debug!(
                package = %package.name,
                output = %out.summary(),
                "Tool bump failed, rewriting manifest"
            ),
            Err(e) => debug!(
                package = %package.name,
                error = %e,
                "Tool bump failed, rewriting manifest"
            ),
        }
        let backend = &self.backends.workspace;
        let path = backend.version_file(package);
        let content = fs::read_to_string(&path)?;
        fs::write(&path, backend.set_version(&content, version)?)?;
        debug!(package = %package.name, version, file = %path.display(), "Rewrote version");
        Ok(())
    }

    async fn upsert_pull_request(
        &self,
        plan: &ReleasePlan,
        branch: &str,
        title: &str,
    ) -> Result<Option<u64>> {
        let forge = &self.backends.forge;
        if !can(forge.as_ref(), Capability::PullRequests, "create_pr") {
            return Ok(None);
        }
        let draft = PullRequestDraft {
            title: title.to_string(),
            body: pull_request_body(plan)?,
            head: branch.to_string(),
            base: self.config.default_branch.clone(),
            labels: vec![PENDING_LABEL.to_string()],
        };
        let existing = forge
            .list_prs(PENDING_LABEL, PrState::Open)
            .await?
            .into_iter()
            .find(|pr| pr.head == branch);
        if let Some(pr) = existing {
            forge.update_pr(pr.number, &draft).await?;
            info!(number = pr.number, "Updated release pull request");
            Ok(Some(pr.number))
        } else {
            let pr = forge.create_pr(&draft).await?;
            info!(number = pr.number, url = ?pr.url, "Opened release pull request");
            Ok(Some(pr.number))
        }
    }

    /// Tag the merged release pull request's plan.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the forge cannot list pull
    /// requests, a backend error when the pull request carries no plan, and
    /// git, forge or changeset errors.
    pub async fn release(&self) -> Result<ReleaseReport> {
        let _lock = self.lock("release")?;
        let forge = &self.backends.forge;
        if !forge.supports(Capability::PullRequests) {
            return Err(Error::config(
                format!("forge '{}' cannot look up release pull requests", forge.name()),
                "Set forge = \"github\" or \"gitlab\" in releasekit.toml",
            ));
        }

        let branch = release_branch(&self.config.label);
        let merged = forge
            .list_prs(PENDING_LABEL, PrState::Merged)
            .await?
            .into_iter()
            .filter(|pr| pr.head == branch)
            .max_by_key(|pr| pr.number);
        let Some(pr) = merged else {
            info!(workspace = %self.config.label, "No merged release pull request pending");
            return Ok(ReleaseReport::default());
        };
        let plan = extract_plan(&pr.body).ok_or_else(|| {
            Error::backend(
                forge.name(),
                format!("pull request #{} carries no release plan", pr.number),
            )
        })?;
        info!(
            number = pr.number,
            merge_sha = ?pr.merge_sha,
            entries = plan.entries.len(),
            "Releasing merged pull request"
        );
        let target = pr.merge_sha.as_deref();

        let mut report = ReleaseReport {
            pull_request: Some(pr.number),
            ..ReleaseReport::default()
        };
        for entry in &plan.entries {
            let message = format!("Release {} {}", entry.package, entry.new_version);
            self.ensure_tag(&entry.tag, &message, target, &mut report).await?;
        }
        if let Some(umbrella) = &plan.umbrella_tag {
            let message = format!("Release {} {umbrella}", self.config.label);
            self.ensure_tag(umbrella, &message, target, &mut report).await?;
        }
        if !self.config.dry_run && !report.tags_created.is_empty() {
            self.backends.vcs.push_tags(&report.tags_created).await?;
        }

        if self.config.publish.create_releases
            && can(forge.as_ref(), Capability::Releases, "create_release")
        {
            for entry in &plan.entries {
                if forge.release_exists(&entry.tag).await? {
                    continue;
                }
                if self.config.dry_run {
                    info!(tag = %entry.tag, "Dry run: would create forge release");
                    continue;
                }
                forge
                    .create_release(&ReleaseDraft {
                        tag: entry.tag.clone(),
                        title: format!("{} {}", entry.package, entry.new_version),
                        notes: release_notes(entry),
                        prerelease: is_prerelease(&entry.new_version),
                    })
                    .await?;
                report.releases_created.push(entry.tag.clone());
            }
        }

        if self.config.dry_run {
            info!(number = pr.number, "Dry run: would relabel pull request and consume changesets");
            return Ok(report);
        }
        if can(forge.as_ref(), Capability::Labels, "relabel") {
            forge.remove_labels(pr.number, &[PENDING_LABEL.to_string()]).await?;
            forge.add_labels(pr.number, &[TAGGED_LABEL.to_string()]).await?;
        }

        let ids: Vec<String> = plan
            .entries
            .iter()
            .flat_map(|e| e.contributing_changesets.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !ids.is_empty() {
            report.changesets_consumed =
                ChangesetStore::new(&self.config.changeset_dir).consume(&ids)?;
            if report.changesets_consumed > 0 {
                let vcs = &self.backends.vcs;
                vcs.commit_all("chore(release): consume changesets").await?;
                vcs.push_branch(&self.config.default_branch, false).await?;
            }
        }
        Ok(report)
    }

    async fn ensure_tag(
        &self,
        tag: &str,
        message: &str,
        target: Option<&str>,
        report: &mut ReleaseReport,
    ) -> Result<()> {
        if self.backends.vcs.tag_exists(tag).await? {
            debug!(tag, "Tag already present");
            report.tags_existing.push(tag.to_string());
            return Ok(());
        }
        if self.config.dry_run {
            info!(tag, "Dry run: would create tag");
        } else {
            self.backends.vcs.create_tag(tag, message, target).await?;
            info!(tag, target = target.unwrap_or("HEAD"), "Created tag");
        }
        report.tags_created.push(tag.to_string());
        Ok(())
    }

    /// Publish every publishable package at its manifest version and write
    /// the release manifest. Versions the previous manifest records as
    /// rolled back are left alone: they are neither published nor tagged.
    ///
    /// # Errors
    ///
    /// Returns discovery or graph errors, or manifest read and write errors.
    /// Per-package failures are reported in the [`PublishReport`].
    pub async fn publish(&self) -> Result<PublishReport> {
        let _lock = self.lock("publish")?;
        let packages = self.discover()?;
        let options = self.plan_options(&packages)?;
        let previous = ReleaseManifest::read(&self.config.manifest_path)?;
        let graph = build_graph(&packages);
        let versions: BTreeMap<String, String> = packages
            .iter()
            .map(|p| (p.name.clone(), p.version.clone()))
            .collect();

        let rolled_back = |p: &Package| {
            let hit = previous
                .as_ref()
                .is_some_and(|m| m.is_rolled_back(&p.name, &p.version));
            if hit {
                warn!(
                    package = %p.name,
                    version = %p.version,
                    "Version was rolled back; bump it before publishing again"
                );
            }
            hit
        };
        let levels: Vec<Vec<PublishItem>> = graph
            .publish_levels()?
            .iter()
            .map(|level| {
                level
                    .iter()
                    .filter_map(|name| graph.get(name))
                    .map(|node| &node.package)
                    .filter(|p| p.publishable && !options.skip.contains(&p.name))
                    .filter(|p| !rolled_back(p))
                    .map(|p| PublishItem {
                        package: p.clone(),
                        tag: options.tag_format_for(&p.name).render(&p.name, &p.version),
                        pins: pins_for(p, &versions),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|level| !level.is_empty())
            .collect();

        let b = &self.backends;
        let pipeline = PublishPipeline::new(
            b.package_manager.clone(),
            b.registry.clone(),
            b.vcs.clone(),
            b.forge.clone(),
            b.workspace.clone(),
            self.config.publish.clone(),
        );
        let report = pipeline.run(levels).await?;

        if !self.config.dry_run {
            let umbrella = options.umbrella_tag.as_ref().and_then(|format| {
                highest_version(
                    report
                        .results
                        .iter()
                        .filter(|r| r.status.is_success())
                        .map(|r| r.version.as_str()),
                    &options.default_scheme,
                )
                .map(|v| format.render("", &v))
            });
            let mut manifest =
                ReleaseManifest::from_report(&report, b.vcs.head_sha().await?, umbrella);
            if let Some(previous) = &previous {
                manifest.carry_rolled_back(previous);
            }
            manifest.write(&self.config.manifest_path)?;
            if !report.is_success() {
                self.report_failure(&report).await;
            }
        }
        Ok(report)
    }

    async fn report_failure(&self, report: &PublishReport) {
        let forge = &self.backends.forge;
        if !can(forge.as_ref(), Capability::Issues, "create_issue") {
            return;
        }
        let mut body = String::from("| Package | Version | Error |\n|---|---|---|\n");
        for failed in report.failed() {
            let _ = writeln!(
                body,
                "| {} | {} | {} |",
                failed.package,
                failed.version,
                failed.error.as_deref().unwrap_or("unknown").replace('|', "\\|")
            );
        }
        for blocked in &report.blocked {
            let _ = writeln!(body, "| {blocked} | | blocked by an earlier level |");
        }
        let title = format!("releasekit: publish failed for {}", self.config.label);
        match forge.create_issue(&title, &body, &[]).await {
            Ok(number) => info!(issue = ?number, "Filed publish failure issue"),
            Err(e) => warn!(error = %e, "Could not file publish failure issue"),
        }
    }
}

fn build_graph(packages: &[Package]) -> PackageGraph<Package> {
    PackageGraph::from_packages(packages.iter().map(|p| (p.name.clone(), p.clone())))
}

fn release_title(label: &str, plan: &ReleasePlan) -> String {
    match plan.entries.as_slice() {
        [only] => format!("chore(release): {} {}", only.package, only.new_version),
        entries => format!("chore(release): {label} ({} packages)", entries.len()),
    }
}

fn release_notes(entry: &ReleasePlanEntry) -> String {
    let mut notes = String::new();
    for commit in &entry.contributing_commits {
        let _ = writeln!(notes, "- {commit}");
    }
    for id in &entry.contributing_changesets {
        let _ = writeln!(notes, "- changeset `{id}`");
    }
    if notes.is_empty() {
        notes = match entry.reason {
            PlanReason::Dependency => "Dependency updates.\n".to_string(),
            _ => format!("{} release.\n", entry.bump),
        };
    }
    notes
}

/// Pull request body: a readable table followed by the plan as JSON inside
/// an HTML comment.
///
/// # Errors
///
/// Returns a JSON error if the plan cannot be serialized.
pub fn pull_request_body(plan: &ReleasePlan) -> Result<String> {
    Ok(format!(
        "## Release plan\n\n```\n{}```\n\n\
         Merging this pull request tags the versions above.\n\n\
         {PLAN_MARKER_START}\n{}\n{PLAN_MARKER_END}\n",
        plan.render_table(),
        plan.to_json()?
    ))
}

/// Recover the plan embedded by [`pull_request_body`].
#[must_use]
pub fn extract_plan(body: &str) -> Option<ReleasePlan> {
    let start = body.find(PLAN_MARKER_START)? + PLAN_MARKER_START.len();
    let rest = &body[start..];
    let end = rest.find(PLAN_MARKER_END)?;
    serde_json::from_str(rest[..end].trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use releasekit_workspaces::Ecosystem;

    fn entry(name: &str, new: &str) -> ReleasePlanEntry {
        ReleasePlanEntry {
            package: name.to_string(),
            ecosystem: Ecosystem::Rust,
            current_version: "1.0.0".to_string(),
            new_version: new.to_string(),
            bump: BumpType::Minor,
            reason: PlanReason::Commits,
            tag: format!("{name}-v{new}"),
            contributing_commits: vec!["abc1234 feat: x".to_string()],
            contributing_changesets: Vec::new(),
        }
    }

    #[test]
    fn test_plan_round_trips_through_pr_body() {
        let plan = ReleasePlan {
            entries: vec![entry("core", "1.1.0")],
            levels: vec![vec!["core".to_string()]],
            umbrella_tag: Some("v1.1.0".to_string()),
        };
        let body = pull_request_body(&plan).unwrap();
        assert!(body.contains("core"));
        assert_eq!(extract_plan(&body), Some(plan));
        assert_eq!(extract_plan("no plan here"), None);
    }

    #[test]
    fn test_release_title() {
        let one = ReleasePlan {
            entries: vec![entry("core", "1.1.0")],
            ..ReleasePlan::default()
        };
        assert_eq!(release_title("rs", &one), "chore(release): core 1.1.0");
        let two = ReleasePlan {
            entries: vec![entry("core", "1.1.0"), entry("cli", "1.1.0")],
            ..ReleasePlan::default()
        };
        assert_eq!(release_title("rs", &two), "chore(release): rs (2 packages)");
    }

    #[test]
    fn test_release_notes_for_dependency_bump() {
        let mut e = entry("app", "1.0.1");
        e.reason = PlanReason::Dependency;
        e.contributing_commits.clear();
        assert_eq!(release_notes(&e), "Dependency updates.\n");
        assert_eq!(release_notes(&entry("core", "1.1.0")), "- abc1234 feat: x\n");
    }

    #[test]
    fn test_package_dir_is_repo_relative() {
        let config: ReleaseConfig = ReleaseConfig::from_toml(
            r#"
[workspace.py]
ecosystem = "python"
root = "py"
"#,
        )
        .unwrap();
        let oc = OrchestratorConfig::new(&config, "py", Path::new("/repo")).unwrap();
        let pkg = Package::new(
            "core",
            "1.0.0",
            "packages/core",
            "/repo/py/packages/core/pyproject.toml",
            Ecosystem::Python,
        );
        assert_eq!(oc.package_dir(&pkg), PathBuf::from("py/packages/core"));
        assert_eq!(oc.workspace_root(), PathBuf::from("/repo/py"));
        assert_eq!(release_branch("py"), "releasekit--release--py");
        assert!(OrchestratorConfig::new(&config, "js", Path::new("/repo")).is_err());
    }
}
