//! Version control boundary.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// A commit as seen by the release flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full commit hash.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Files changed by the commit, relative to the repository root.
    pub files: Vec<PathBuf>,
}

impl CommitRecord {
    /// Create a record.
    #[must_use]
    pub fn new(sha: impl Into<String>, message: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            files,
        }
    }
}

/// Git operations used by planning, tagging and rollback.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Commits reachable from HEAD but not from `since` that touch any of
    /// `paths` (all commits when `paths` is empty), newest first.
    async fn log_since(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<Vec<CommitRecord>>;

    /// Whether a local tag exists.
    async fn tag_exists(&self, tag: &str) -> Result<bool>;

    /// Whether the tag exists on the remote.
    async fn remote_tag_exists(&self, tag: &str) -> Result<bool>;

    /// Create an annotated tag at `target`, or at HEAD when `None`.
    async fn create_tag(&self, tag: &str, message: &str, target: Option<&str>) -> Result<()>;

    /// Delete a local tag.
    async fn delete_tag(&self, tag: &str) -> Result<()>;

    /// Push the given tags.
    async fn push_tags(&self, tags: &[String]) -> Result<()>;

    /// Delete a tag on the remote.
    async fn delete_remote_tag(&self, tag: &str) -> Result<()>;

    /// Whether the working tree has no uncommitted changes.
    async fn is_clean(&self) -> Result<bool>;

    /// Current branch name.
    async fn current_branch(&self) -> Result<String>;

    /// Whether the clone is shallow. Commit windows are unreliable if so.
    async fn is_shallow(&self) -> Result<bool>;

    /// Files changed between `since` and HEAD.
    async fn diff_files_since(&self, since: &str) -> Result<Vec<PathBuf>>;

    /// HEAD commit hash.
    async fn head_sha(&self) -> Result<String>;

    /// Files changed by one commit.
    async fn changed_files(&self, sha: &str) -> Result<Vec<PathBuf>>;

    /// Create and switch to `branch`, resetting it if it exists.
    async fn checkout_new_branch(&self, branch: &str) -> Result<()>;

    /// Stage everything and commit.
    async fn commit_all(&self, message: &str) -> Result<()>;

    /// Push `branch` to the remote.
    async fn push_branch(&self, branch: &str, force: bool) -> Result<()>;
}
