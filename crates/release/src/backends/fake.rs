//! In-memory backends for tests.
//!
//! Each fake keeps its state behind a mutex and counts calls per operation
//! so tests can assert exactly which side effects happened.

use super::forge::{Capability, Forge, PrState, PullRequest, PullRequestDraft, ReleaseDraft};
use super::package_manager::{CommandOutput, PackageManager};
use super::registry::Registry;
use super::vcs::{CommitRecord, Vcs};
use crate::checksum::sha256_file;
use crate::error::{Error, Result};
use async_trait::async_trait;
use releasekit_workspaces::Package;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-operation call counter.
#[derive(Debug, Default)]
pub struct CallLog(Mutex<BTreeMap<String, usize>>);

impl CallLog {
    fn record(&self, operation: &str) {
        *guard(&self.0).entry(operation.to_string()).or_default() += 1;
    }

    /// Number of calls to `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        guard(&self.0).get(operation).copied().unwrap_or(0)
    }

    /// Total calls across the given operations.
    #[must_use]
    pub fn count_any(&self, operations: &[&str]) -> usize {
        operations.iter().map(|op| self.count(op)).sum()
    }
}

// Vcs

#[derive(Debug)]
struct VcsState {
    /// Newest first.
    commits: Vec<CommitRecord>,
    /// Tag name to the number of commits up to and including its target.
    tags: BTreeMap<String, usize>,
    tag_targets: BTreeMap<String, String>,
    remote_tags: BTreeSet<String>,
    pushed_branches: Vec<String>,
    branch: String,
    clean: bool,
    shallow: bool,
}

/// In-memory git repository.
#[derive(Debug)]
pub struct FakeVcs {
    state: Mutex<VcsState>,
    /// Call counters.
    pub calls: CallLog,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVcs {
    /// An empty, clean repository on `main`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VcsState {
                commits: Vec::new(),
                tags: BTreeMap::new(),
                tag_targets: BTreeMap::new(),
                remote_tags: BTreeSet::new(),
                pushed_branches: Vec::new(),
                branch: "main".to_string(),
                clean: true,
                shallow: false,
            }),
            calls: CallLog::default(),
        }
    }

    /// Append a commit on top of HEAD.
    pub fn commit(&self, sha: &str, message: &str, files: &[&str]) {
        let record = CommitRecord::new(sha, message, files.iter().map(PathBuf::from).collect());
        guard(&self.state).commits.insert(0, record);
    }

    /// Tag the current HEAD locally and on the remote without counting a call.
    pub fn seed_tag(&self, tag: &str) {
        let mut state = guard(&self.state);
        let at = state.commits.len();
        state.tags.insert(tag.to_string(), at);
        state.remote_tags.insert(tag.to_string());
    }

    /// Mark the working tree dirty or clean.
    pub fn set_clean(&self, clean: bool) {
        guard(&self.state).clean = clean;
    }

    /// Local tags.
    #[must_use]
    pub fn tags(&self) -> BTreeSet<String> {
        guard(&self.state).tags.keys().cloned().collect()
    }

    /// Commit a tag created through [`Vcs::create_tag`] points at.
    #[must_use]
    pub fn tag_target(&self, tag: &str) -> Option<String> {
        guard(&self.state).tag_targets.get(tag).cloned()
    }

    /// Remote tags.
    #[must_use]
    pub fn remote_tags(&self) -> BTreeSet<String> {
        guard(&self.state).remote_tags.clone()
    }

    /// Current branch.
    #[must_use]
    pub fn branch(&self) -> String {
        guard(&self.state).branch.clone()
    }

    /// Branches pushed so far.
    #[must_use]
    pub fn pushed_branches(&self) -> Vec<String> {
        guard(&self.state).pushed_branches.clone()
    }

    fn window(state: &VcsState, since: Option<&str>) -> Result<Vec<CommitRecord>> {
        let Some(since) = since else {
            return Ok(state.commits.clone());
        };
        let at = state
            .tags
            .get(since)
            .copied()
            .or_else(|| {
                state
                    .commits
                    .iter()
                    .position(|c| c.sha.starts_with(since))
                    .map(|i| state.commits.len() - i)
            })
            .ok_or_else(|| Error::git(format!("unknown revision '{since}'")))?;
        let newer = state.commits.len().saturating_sub(at);
        Ok(state.commits[..newer].to_vec())
    }
}

fn touches(commit: &CommitRecord, paths: &[PathBuf]) -> bool {
    paths.is_empty()
        || paths.iter().any(|p| {
            p.as_os_str().is_empty()
                || p == Path::new(".")
                || commit.files.iter().any(|f| f.starts_with(p))
        })
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn log_since(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<Vec<CommitRecord>> {
        self.calls.record("log_since");
        let state = guard(&self.state);
        Ok(Self::window(&state, since)?
            .into_iter()
            .filter(|c| touches(c, paths))
            .collect())
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool> {
        self.calls.record("tag_exists");
        Ok(guard(&self.state).tags.contains_key(tag))
    }

    async fn remote_tag_exists(&self, tag: &str) -> Result<bool> {
        self.calls.record("remote_tag_exists");
        Ok(guard(&self.state).remote_tags.contains(tag))
    }

    async fn create_tag(&self, tag: &str, _message: &str, target: Option<&str>) -> Result<()> {
        self.calls.record("create_tag");
        let mut state = guard(&self.state);
        if state.tags.contains_key(tag) {
            return Err(Error::git(format!("tag '{tag}' already exists")));
        }
        let index = match target {
            Some(sha) => state
                .commits
                .iter()
                .position(|c| c.sha.starts_with(sha))
                .ok_or_else(|| Error::git(format!("unknown revision '{sha}'")))?,
            None => 0,
        };
        let at = state.commits.len() - index;
        let sha = state
            .commits
            .get(index)
            .map_or_else(|| "0".repeat(40), |c| c.sha.clone());
        state.tags.insert(tag.to_string(), at);
        state.tag_targets.insert(tag.to_string(), sha);
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        self.calls.record("delete_tag");
        guard(&self.state).tags.remove(tag);
        Ok(())
    }

    async fn push_tags(&self, tags: &[String]) -> Result<()> {
        self.calls.record("push_tags");
        guard(&self.state).remote_tags.extend(tags.iter().cloned());
        Ok(())
    }

    async fn delete_remote_tag(&self, tag: &str) -> Result<()> {
        self.calls.record("delete_remote_tag");
        guard(&self.state).remote_tags.remove(tag);
        Ok(())
    }

    async fn is_clean(&self) -> Result<bool> {
        Ok(guard(&self.state).clean)
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch())
    }

    async fn is_shallow(&self) -> Result<bool> {
        Ok(guard(&self.state).shallow)
    }

    async fn diff_files_since(&self, since: &str) -> Result<Vec<PathBuf>> {
        let state = guard(&self.state);
        let files: BTreeSet<PathBuf> = Self::window(&state, Some(since))?
            .into_iter()
            .flat_map(|c| c.files)
            .collect();
        Ok(files.into_iter().collect())
    }

    async fn head_sha(&self) -> Result<String> {
        Ok(guard(&self.state)
            .commits
            .first()
            .map_or_else(|| "0".repeat(40), |c| c.sha.clone()))
    }

    async fn changed_files(&self, sha: &str) -> Result<Vec<PathBuf>> {
        guard(&self.state)
            .commits
            .iter()
            .find(|c| c.sha.starts_with(sha))
            .map(|c| c.files.clone())
            .ok_or_else(|| Error::git(format!("unknown commit '{sha}'")))
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.calls.record("checkout_new_branch");
        guard(&self.state).branch = branch.to_string();
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        self.calls.record("commit_all");
        let mut state = guard(&self.state);
        let sha = format!("{:040x}", state.commits.len() + 1);
        state.commits.insert(0, CommitRecord::new(sha, message, Vec::new()));
        state.clean = true;
        Ok(())
    }

    async fn push_branch(&self, branch: &str, _force: bool) -> Result<()> {
        self.calls.record("push_branch");
        guard(&self.state).pushed_branches.push(branch.to_string());
        Ok(())
    }
}

// Registry

#[derive(Debug, Default)]
struct RegistryState {
    versions: BTreeMap<(String, String), BTreeMap<String, String>>,
    yanked: BTreeSet<(String, String)>,
    corrupt: HashSet<String>,
    yank_failures: u32,
}

/// In-memory registry.
#[derive(Debug)]
pub struct FakeRegistry {
    name: String,
    supports_yank: bool,
    state: Mutex<RegistryState>,
    /// Call counters.
    pub calls: CallLog,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self::new("fake")
    }
}

impl FakeRegistry {
    /// An empty registry that supports yanking.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supports_yank: true,
            state: Mutex::new(RegistryState::default()),
            calls: CallLog::default(),
        }
    }

    /// Disable yanking, as on registries without the operation.
    #[must_use]
    pub const fn without_yank(mut self) -> Self {
        self.supports_yank = false;
        self
    }

    /// Mark `package@version` as already published.
    pub fn seed_version(&self, package: &str, version: &str) {
        guard(&self.state)
            .versions
            .insert((package.to_string(), version.to_string()), BTreeMap::new());
    }

    /// Report wrong digests for everything `package` publishes from now on.
    pub fn corrupt_checksums(&self, package: &str) {
        guard(&self.state).corrupt.insert(package.to_string());
    }

    /// Fail the next `times` yank calls with a transient error.
    pub fn fail_yank(&self, times: u32) {
        guard(&self.state).yank_failures = times;
    }

    /// Record an upload.
    pub fn record_publish(
        &self,
        package: &str,
        version: &str,
        checksums: BTreeMap<String, String>,
    ) {
        let mut state = guard(&self.state);
        let checksums = if state.corrupt.contains(package) {
            checksums.into_keys().map(|k| (k, "0".repeat(64))).collect()
        } else {
            checksums
        };
        state
            .versions
            .insert((package.to_string(), version.to_string()), checksums);
    }

    /// Whether `package@version` has been yanked.
    #[must_use]
    pub fn is_yanked(&self, package: &str, version: &str) -> bool {
        guard(&self.state)
            .yanked
            .contains(&(package.to_string(), version.to_string()))
    }

    /// Every published `(package, version)`.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String)> {
        guard(&self.state).versions.keys().cloned().collect()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn version_exists(&self, package: &str, version: &str) -> Result<bool> {
        self.calls.record("version_exists");
        Ok(guard(&self.state)
            .versions
            .contains_key(&(package.to_string(), version.to_string())))
    }

    async fn checksums(&self, package: &str, version: &str) -> Result<BTreeMap<String, String>> {
        self.calls.record("checksums");
        Ok(guard(&self.state)
            .versions
            .get(&(package.to_string(), version.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn yank(&self, package: &str, version: &str, _reason: Option<&str>) -> Result<bool> {
        self.calls.record("yank");
        if !self.supports_yank {
            return Ok(false);
        }
        let mut state = guard(&self.state);
        if state.yank_failures > 0 {
            state.yank_failures -= 1;
            return Err(Error::backend(&self.name, "503 Service Unavailable"));
        }
        state
            .yanked
            .insert((package.to_string(), version.to_string()));
        Ok(true)
    }
}

// Package manager

#[derive(Debug, Default)]
struct PackageManagerState {
    fail_build: HashSet<String>,
    fail_smoke: HashSet<String>,
    /// Remaining transient publish failures per package.
    publish_failures: BTreeMap<String, u32>,
    /// Packages whose failing publish attempts still reach the registry.
    ambiguous: HashSet<String>,
    events: Vec<String>,
    manifests_at_build: BTreeMap<String, String>,
}

/// Package manager that "builds" a small artifact per package and publishes
/// it into a [`FakeRegistry`].
#[derive(Debug)]
pub struct FakePackageManager {
    registry: Arc<FakeRegistry>,
    state: Mutex<PackageManagerState>,
    /// Call counters.
    pub calls: CallLog,
}

impl FakePackageManager {
    /// Publish into `registry`.
    #[must_use]
    pub fn new(registry: Arc<FakeRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(PackageManagerState::default()),
            calls: CallLog::default(),
        }
    }

    /// Make `package`'s build fail.
    pub fn fail_build(&self, package: &str) {
        guard(&self.state).fail_build.insert(package.to_string());
    }

    /// Make `package`'s smoke test fail.
    pub fn fail_smoke_test(&self, package: &str) {
        guard(&self.state).fail_smoke.insert(package.to_string());
    }

    /// Fail the next `times` publish attempts of `package`.
    pub fn fail_publish(&self, package: &str, times: u32) {
        guard(&self.state)
            .publish_failures
            .insert(package.to_string(), times);
    }

    /// Like [`Self::fail_publish`], but the failing attempt still uploads.
    pub fn fail_publish_after_upload(&self, package: &str, times: u32) {
        let mut state = guard(&self.state);
        state.publish_failures.insert(package.to_string(), times);
        state.ambiguous.insert(package.to_string());
    }

    /// Ordered `build:<name>` / `publish:<name>@<version>` events.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        guard(&self.state).events.clone()
    }

    /// Manifest content observed when `package` was built.
    #[must_use]
    pub fn manifest_at_build(&self, package: &str) -> Option<String> {
        guard(&self.state).manifests_at_build.get(package).cloned()
    }
}

#[async_trait]
impl PackageManager for FakePackageManager {
    fn name(&self) -> &str {
        "fake"
    }

    async fn build(&self, package: &Package, out_dir: &Path) -> Result<CommandOutput> {
        self.calls.record("build");
        let manifest = tokio::fs::read_to_string(&package.manifest_path).await.ok();
        {
            let mut state = guard(&self.state);
            state.events.push(format!("build:{}", package.name));
            if let Some(manifest) = manifest {
                state.manifests_at_build.insert(package.name.clone(), manifest);
            }
            if state.fail_build.contains(&package.name) {
                return Ok(CommandOutput::failed(
                    1,
                    format!("error: could not compile `{}`", package.name),
                ));
            }
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let artifact = out_dir.join(format!("{}-{}.tar", package.name, package.version));
        tokio::fs::write(&artifact, format!("{}@{}", package.name, package.version)).await?;
        Ok(CommandOutput::ok().with_artifacts(vec![artifact]))
    }

    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput> {
        self.calls.record("publish");
        let (fail, ambiguous) = {
            let mut state = guard(&self.state);
            state
                .events
                .push(format!("publish:{}@{}", package.name, package.version));
            let ambiguous = state.ambiguous.contains(&package.name);
            let fail = match state.publish_failures.get_mut(&package.name) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            };
            (fail, ambiguous)
        };
        if dry_run {
            return Ok(CommandOutput::ok());
        }
        if !fail || ambiguous {
            let mut checksums = BTreeMap::new();
            for artifact in artifacts {
                let name = artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                checksums.insert(name, sha256_file(artifact)?);
            }
            self.registry
                .record_publish(&package.name, &package.version, checksums);
        }
        if fail {
            return Ok(CommandOutput::failed(1, "error: 503 Service Unavailable"));
        }
        Ok(CommandOutput::ok())
    }

    async fn lock(&self, _root: &Path) -> Result<CommandOutput> {
        self.calls.record("lock");
        Ok(CommandOutput::ok())
    }

    async fn version_bump(&self, _package: &Package, _version: &str) -> Result<CommandOutput> {
        self.calls.record("version_bump");
        Ok(CommandOutput::failed(1, "no native version command"))
    }

    async fn smoke_test(&self, package: &Package, _version: &str) -> Result<CommandOutput> {
        self.calls.record("smoke_test");
        if guard(&self.state).fail_smoke.contains(&package.name) {
            return Ok(CommandOutput::failed(1, format!("ImportError: {}", package.name)));
        }
        Ok(CommandOutput::ok())
    }
}

// Forge

#[derive(Debug, Default)]
struct ForgeState {
    prs: Vec<PullRequest>,
    releases: BTreeSet<String>,
    assets: Vec<(String, PathBuf)>,
    issues: Vec<String>,
}

/// In-memory forge.
#[derive(Debug, Default)]
pub struct FakeForge {
    unsupported: HashSet<Capability>,
    state: Mutex<ForgeState>,
    /// Call counters.
    pub calls: CallLog,
}

impl FakeForge {
    /// A forge supporting every capability.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop support for `capability`.
    #[must_use]
    pub fn without(mut self, capability: Capability) -> Self {
        self.unsupported.insert(capability);
        self
    }

    /// Simulate merging a pull request.
    pub fn merge_pr(&self, number: u64, merge_sha: &str) {
        if let Some(pr) = guard(&self.state).prs.iter_mut().find(|p| p.number == number) {
            pr.state = PrState::Merged;
            pr.merge_sha = Some(merge_sha.to_string());
        }
    }

    /// All pull requests.
    #[must_use]
    pub fn prs(&self) -> Vec<PullRequest> {
        guard(&self.state).prs.clone()
    }

    /// Tags with a release.
    #[must_use]
    pub fn releases(&self) -> BTreeSet<String> {
        guard(&self.state).releases.clone()
    }

    /// Created issue titles.
    #[must_use]
    pub fn issues(&self) -> Vec<String> {
        guard(&self.state).issues.clone()
    }
}

#[async_trait]
impl Forge for FakeForge {
    fn name(&self) -> &str {
        "fake"
    }

    fn supports(&self, capability: Capability) -> bool {
        !self.unsupported.contains(&capability)
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn create_pr(&self, draft: &PullRequestDraft) -> Result<PullRequest> {
        self.calls.record("create_pr");
        let mut state = guard(&self.state);
        let pr = PullRequest {
            number: state.prs.len() as u64 + 1,
            title: draft.title.clone(),
            body: draft.body.clone(),
            head: draft.head.clone(),
            base: draft.base.clone(),
            labels: draft.labels.clone(),
            state: PrState::Open,
            url: None,
            merge_sha: None,
        };
        state.prs.push(pr.clone());
        Ok(pr)
    }

    async fn update_pr(&self, number: u64, draft: &PullRequestDraft) -> Result<()> {
        self.calls.record("update_pr");
        let mut state = guard(&self.state);
        let pr = state
            .prs
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| Error::backend("fake", format!("no pull request #{number}")))?;
        pr.title.clone_from(&draft.title);
        pr.body.clone_from(&draft.body);
        Ok(())
    }

    async fn list_prs(&self, label: &str, state: PrState) -> Result<Vec<PullRequest>> {
        self.calls.record("list_prs");
        Ok(guard(&self.state)
            .prs
            .iter()
            .filter(|p| p.labels.iter().any(|l| l == label))
            .filter(|p| state == PrState::All || p.state == state)
            .cloned()
            .collect())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        self.calls.record("add_labels");
        if let Some(pr) = guard(&self.state).prs.iter_mut().find(|p| p.number == number) {
            for label in labels {
                if !pr.labels.contains(label) {
                    pr.labels.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        self.calls.record("remove_labels");
        if let Some(pr) = guard(&self.state).prs.iter_mut().find(|p| p.number == number) {
            pr.labels.retain(|l| !labels.contains(l));
        }
        Ok(())
    }

    async fn create_release(&self, draft: &ReleaseDraft) -> Result<()> {
        self.calls.record("create_release");
        guard(&self.state).releases.insert(draft.tag.clone());
        Ok(())
    }

    async fn delete_release(&self, tag: &str) -> Result<()> {
        self.calls.record("delete_release");
        guard(&self.state).releases.remove(tag);
        Ok(())
    }

    async fn release_exists(&self, tag: &str) -> Result<bool> {
        Ok(guard(&self.state).releases.contains(tag))
    }

    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<()> {
        self.calls.record("upload_asset");
        guard(&self.state)
            .assets
            .push((tag.to_string(), path.to_path_buf()));
        Ok(())
    }

    async fn create_issue(
        &self,
        title: &str,
        _body: &str,
        _labels: &[String],
    ) -> Result<Option<u64>> {
        self.calls.record("create_issue");
        let mut state = guard(&self.state);
        state.issues.push(title.to_string());
        Ok(Some(state.issues.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_vcs_log_window() {
        let vcs = FakeVcs::new();
        vcs.commit("a1", "feat: one", &["core/src/lib.rs"]);
        vcs.seed_tag("core-v1.0.0");
        vcs.commit("b2", "fix: two", &["core/src/lib.rs"]);
        vcs.commit("c3", "docs: three", &["docs/readme.md"]);

        let all = vcs.log_since(None, &[]).await.unwrap();
        assert_eq!(all.iter().map(|c| c.sha.as_str()).collect::<Vec<_>>(), ["c3", "b2", "a1"]);

        let since = vcs
            .log_since(Some("core-v1.0.0"), &[PathBuf::from("core")])
            .await
            .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].sha, "b2");

        assert!(vcs.log_since(Some("nope"), &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fake_vcs_tag_target() {
        let vcs = FakeVcs::new();
        vcs.commit("a1", "feat: one", &["core/src/lib.rs"]);
        vcs.commit("b2", "fix: two", &["core/src/lib.rs"]);

        vcs.create_tag("core-v1.0.0", "core 1.0.0", Some("a1")).await.unwrap();
        vcs.create_tag("core-v1.0.1", "core 1.0.1", None).await.unwrap();
        assert_eq!(vcs.tag_target("core-v1.0.0").as_deref(), Some("a1"));
        assert_eq!(vcs.tag_target("core-v1.0.1").as_deref(), Some("b2"));
        assert_eq!(vcs.log_since(Some("core-v1.0.0"), &[]).await.unwrap().len(), 1);
        assert!(vcs.create_tag("x", "x", Some("zz")).await.is_err());
    }

    #[tokio::test]
    async fn test_fake_registry_yank_support() {
        let registry = FakeRegistry::new("npm").without_yank();
        registry.seed_version("core", "1.0.0");
        assert!(registry.version_exists("core", "1.0.0").await.unwrap());
        assert!(!registry.yank("core", "1.0.0", None).await.unwrap());
        assert!(!registry.is_yanked("core", "1.0.0"));
        assert_eq!(registry.calls.count("yank"), 1);
    }
}
