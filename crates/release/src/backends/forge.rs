//! Code forge boundary (pull requests, labels, releases, issues).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Optional forge features. Operations a forge does not support are logged
/// and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Pull or merge requests.
    PullRequests,
    /// Labels on pull requests.
    Labels,
    /// Releases attached to tags.
    Releases,
    /// Binary assets on releases.
    ReleaseAssets,
    /// Issues.
    Issues,
}

/// Pull request state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    /// Open.
    Open,
    /// Merged.
    Merged,
    /// Closed without merging.
    Closed,
    /// Any state.
    All,
}

impl PrState {
    /// Lowercase name as used by forge CLIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// A pull request as returned by a forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Forge-assigned number.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
    /// Label names.
    pub labels: Vec<String>,
    /// State.
    pub state: PrState,
    /// Web URL.
    pub url: Option<String>,
    /// Merge commit, once merged.
    pub merge_sha: Option<String>,
}

/// Content for creating or updating a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
    /// Labels to apply on creation.
    pub labels: Vec<String>,
}

/// Content for a forge release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDraft {
    /// Tag the release is attached to.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Release notes.
    pub notes: String,
    /// Mark as prerelease.
    pub prerelease: bool,
}

/// Forge operations used by the prepare, release and rollback flows.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Forge name for logs.
    fn name(&self) -> &str;

    /// Whether this forge implements `capability`.
    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    /// Whether the forge CLI is installed and authenticated.
    async fn is_available(&self) -> bool;

    /// Open a pull request.
    async fn create_pr(&self, draft: &PullRequestDraft) -> Result<PullRequest>;

    /// Replace a pull request's title and body.
    async fn update_pr(&self, number: u64, draft: &PullRequestDraft) -> Result<()>;

    /// Pull requests carrying `label` in `state`.
    async fn list_prs(&self, label: &str, state: PrState) -> Result<Vec<PullRequest>>;

    /// Add labels to a pull request.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    /// Remove labels from a pull request.
    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    /// Create a release for an existing tag.
    async fn create_release(&self, draft: &ReleaseDraft) -> Result<()>;

    /// Delete the release attached to `tag`. Missing releases are not an error.
    async fn delete_release(&self, tag: &str) -> Result<()>;

    /// Whether a release exists for `tag`.
    async fn release_exists(&self, tag: &str) -> Result<bool>;

    /// Attach a file to the release for `tag`.
    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<()>;

    /// Open an issue, returning its number.
    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Option<u64>>;
}

/// Whether `forge` can perform `capability`; logs the skipped operation when
/// it cannot.
pub fn can(forge: &dyn Forge, capability: Capability, operation: &str) -> bool {
    let supported = forge.supports(capability);
    if !supported {
        info!(forge = forge.name(), operation, "Forge does not support this operation, skipping");
    }
    supported
}

/// The forge used when none is configured. Every operation is a logged no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForge;

#[async_trait]
impl Forge for NoForge {
    fn name(&self) -> &str {
        "none"
    }

    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn create_pr(&self, draft: &PullRequestDraft) -> Result<PullRequest> {
        info!(head = %draft.head, "No forge configured, not opening a pull request");
        Ok(PullRequest {
            number: 0,
            title: draft.title.clone(),
            body: draft.body.clone(),
            head: draft.head.clone(),
            base: draft.base.clone(),
            labels: draft.labels.clone(),
            state: PrState::Open,
            url: None,
            merge_sha: None,
        })
    }

    async fn update_pr(&self, _number: u64, _draft: &PullRequestDraft) -> Result<()> {
        Ok(())
    }

    async fn list_prs(&self, _label: &str, _state: PrState) -> Result<Vec<PullRequest>> {
        Ok(Vec::new())
    }

    async fn add_labels(&self, _number: u64, _labels: &[String]) -> Result<()> {
        Ok(())
    }

    async fn remove_labels(&self, _number: u64, _labels: &[String]) -> Result<()> {
        Ok(())
    }

    async fn create_release(&self, draft: &ReleaseDraft) -> Result<()> {
        info!(tag = %draft.tag, "No forge configured, not creating a release");
        Ok(())
    }

    async fn delete_release(&self, _tag: &str) -> Result<()> {
        Ok(())
    }

    async fn release_exists(&self, _tag: &str) -> Result<bool> {
        Ok(false)
    }

    async fn upload_asset(&self, _tag: &str, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn create_issue(
        &self,
        _title: &str,
        _body: &str,
        _labels: &[String],
    ) -> Result<Option<u64>> {
        Ok(None)
    }
}
