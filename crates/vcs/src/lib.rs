//! Git backend for releasekit.
//!
//! [`GitCli`] implements [`releasekit_release::Vcs`] by shelling out to the
//! `git` binary, so it behaves exactly like the user's own checkout:
//! credential helpers, SSH config and hooks all apply.
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekit_vcs::GitCli;
//! use releasekit_release::Vcs;
//!
//! let git = GitCli::new(".");
//! let commits = git.log_since(Some("core-v1.0.0"), &[]).await?;
//! ```

use async_trait::async_trait;
use releasekit_release::{Cmd, CommitRecord, Error, Result, Vcs};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Record separator placed before each commit in `git log` output.
const RECORD_SEP: char = '\u{1e}';
/// Field separator between hash, message and file list.
const FIELD_SEP: char = '\u{1f}';
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%B%x1f";

/// Default remote name.
pub const DEFAULT_REMOTE: &str = "origin";

/// [`Vcs`] implementation driving the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    remote: String,
}

impl GitCli {
    /// Operate on the repository containing `root`, pushing to `origin`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    /// Push to and query `remote` instead of `origin`.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self) -> Cmd {
        Cmd::new("git").current_dir(&self.root)
    }

    /// Run git and return trimmed stdout, mapping failures to [`Error::Git`].
    async fn checked(&self, args: &[&str]) -> Result<String> {
        let cmd = self.git().args(args.iter().copied());
        let output = cmd.run().await?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(Error::git(format!("`{}` failed: {}", cmd.display(), output.summary())))
        }
    }

    /// Run git and report only whether it exited successfully.
    async fn succeeds(&self, args: &[&str]) -> Result<bool> {
        Ok(self.git().args(args.iter().copied()).run().await?.success)
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`] and `--name-only`.
#[must_use]
pub fn parse_log(output: &str) -> Vec<CommitRecord> {
    output
        .split(RECORD_SEP)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(|chunk| {
            let mut fields = chunk.splitn(3, FIELD_SEP);
            let sha = fields.next()?.trim();
            if sha.is_empty() {
                return None;
            }
            let message = fields.next().unwrap_or_default().trim();
            let files = fields.next().map(parse_file_list).unwrap_or_default();
            Some(CommitRecord::new(sha, message, files))
        })
        .collect()
}

fn parse_file_list(output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn path_args(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let s = p.to_string_lossy();
            if s.is_empty() { ".".to_string() } else { s.into_owned() }
        })
        .collect()
}

#[async_trait]
impl Vcs for GitCli {
    async fn log_since(&self, since: Option<&str>, paths: &[PathBuf]) -> Result<Vec<CommitRecord>> {
        let range = since.map_or_else(|| "HEAD".to_string(), |tag| format!("{tag}..HEAD"));
        let cmd = self
            .git()
            .args(["log", LOG_FORMAT, "--name-only", range.as_str(), "--"])
            .args(path_args(paths));
        let output = cmd.run().await?;
        if !output.success {
            return Err(Error::git(format!("`{}` failed: {}", cmd.display(), output.summary())));
        }
        let commits = parse_log(&output.stdout);
        debug!(range = %range, count = commits.len(), "Read commit window");
        Ok(commits)
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool> {
        let reference = format!("refs/tags/{tag}");
        self.succeeds(&["rev-parse", "--quiet", "--verify", &reference]).await
    }

    async fn remote_tag_exists(&self, tag: &str) -> Result<bool> {
        let reference = format!("refs/tags/{tag}");
        let out = self
            .checked(&["ls-remote", "--tags", &self.remote, &reference])
            .await?;
        Ok(!out.is_empty())
    }

    async fn create_tag(&self, tag: &str, message: &str, target: Option<&str>) -> Result<()> {
        let mut args = vec!["tag", "--annotate", tag, "--message", message];
        args.extend(target);
        self.checked(&args).await?;
        info!(tag, target = target.unwrap_or("HEAD"), "Created tag");
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        self.checked(&["tag", "--delete", tag]).await?;
        Ok(())
    }

    async fn push_tags(&self, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let refs: Vec<String> = tags.iter().map(|t| format!("refs/tags/{t}")).collect();
        let cmd = self.git().args(["push", self.remote.as_str()]).args(refs);
        let output = cmd.run().await?;
        if !output.success {
            return Err(Error::git(format!("`{}` failed: {}", cmd.display(), output.summary())));
        }
        info!(count = tags.len(), remote = %self.remote, "Pushed tags");
        Ok(())
    }

    async fn delete_remote_tag(&self, tag: &str) -> Result<()> {
        let reference = format!("refs/tags/{tag}");
        let output = self
            .git()
            .args(["push", self.remote.as_str(), "--delete", reference.as_str()])
            .run()
            .await?;
        if output.success || output.stderr.contains("remote ref does not exist") {
            Ok(())
        } else {
            Err(Error::git(format!(
                "failed to delete remote tag {tag}: {}",
                output.summary()
            )))
        }
    }

    async fn is_clean(&self) -> Result<bool> {
        Ok(self.checked(&["status", "--porcelain"]).await?.is_empty())
    }

    async fn current_branch(&self) -> Result<String> {
        self.checked(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn is_shallow(&self) -> Result<bool> {
        Ok(self.checked(&["rev-parse", "--is-shallow-repository"]).await? == "true")
    }

    async fn diff_files_since(&self, since: &str) -> Result<Vec<PathBuf>> {
        let range = format!("{since}..HEAD");
        let out = self.checked(&["diff", "--name-only", &range]).await?;
        Ok(parse_file_list(&out))
    }

    async fn head_sha(&self) -> Result<String> {
        self.checked(&["rev-parse", "HEAD"]).await
    }

    async fn changed_files(&self, sha: &str) -> Result<Vec<PathBuf>> {
        let out = self
            .checked(&["show", "--pretty=format:", "--name-only", sha])
            .await?;
        Ok(parse_file_list(&out))
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.checked(&["checkout", "-B", branch]).await?;
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        self.checked(&["add", "--all"]).await?;
        self.checked(&["commit", "--message", message]).await?;
        Ok(())
    }

    async fn push_branch(&self, branch: &str, force: bool) -> Result<()> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        let mut args = vec!["push"];
        if force {
            args.push("--force-with-lease");
        }
        args.extend([self.remote.as_str(), refspec.as_str()]);
        self.checked(&args).await?;
        info!(branch, remote = %self.remote, "Pushed branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_records() {
        let raw = "\u{1e}abc123\u{1f}feat(core): add api\n\nBody line\n\u{1f}\n\n\
                   crates/core/src/lib.rs\ncrates/core/Cargo.toml\n\
                   \u{1e}def456\u{1f}chore: tidy\n\u{1f}\n";
        let commits = parse_log(raw);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "abc123");
        assert_eq!(commits[0].message, "feat(core): add api\n\nBody line");
        assert_eq!(
            commits[0].files,
            vec![
                PathBuf::from("crates/core/src/lib.rs"),
                PathBuf::from("crates/core/Cargo.toml")
            ]
        );
        assert_eq!(commits[1].message, "chore: tidy");
        assert!(commits[1].files.is_empty());
    }

    #[test]
    fn test_parse_log_empty() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("\n\n").is_empty());
    }

    #[test]
    fn test_root_path_becomes_dot() {
        assert_eq!(path_args(&[PathBuf::new(), PathBuf::from("py/a")]), vec![".", "py/a"]);
    }
}
