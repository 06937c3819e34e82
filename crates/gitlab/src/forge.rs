//! [`Forge`] implementation backed by the `glab` CLI.

use async_trait::async_trait;
use releasekit_release::{
    Cmd, CommandOutput, Error, Forge, PrState, PullRequest, PullRequestDraft, ReleaseDraft, Result,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BACKEND: &str = "gitlab";

/// GitLab forge driven through `glab`.
#[derive(Debug, Clone)]
pub struct GlabForge {
    program: String,
    root: PathBuf,
    repo: Option<String>,
}

impl GlabForge {
    /// Run `glab` from `root`, targeting the project `glab` infers there.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            program: "glab".to_string(),
            root: root.into(),
            repo: None,
        }
    }

    /// Target `group/project` explicitly.
    #[must_use]
    pub fn with_repo(mut self, owner: impl AsRef<str>, repo: impl AsRef<str>) -> Self {
        self.repo = Some(format!("{}/{}", owner.as_ref(), repo.as_ref()));
        self
    }

    /// Use a different `glab` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn glab(&self) -> Cmd {
        let cmd = Cmd::new(&self.program).current_dir(&self.root);
        match &self.repo {
            Some(repo) => cmd.env("GITLAB_REPO", repo),
            None => cmd,
        }
    }

    async fn run(&self, cmd: Cmd) -> Result<CommandOutput> {
        let output = cmd.run().await?;
        if output.success {
            Ok(output)
        } else {
            Err(Error::backend(
                BACKEND,
                format!("`{}` failed: {}", cmd.display(), output.summary()),
            ))
        }
    }
}

fn number_from_url(output: &str) -> Option<u64> {
    output
        .split_whitespace()
        .rev()
        .find(|w| w.starts_with("http"))?
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

fn not_found(out: &CommandOutput) -> bool {
    let stderr = out.stderr.to_ascii_lowercase();
    stderr.contains("404") || stderr.contains("not found")
}

#[derive(Debug, Deserialize)]
struct GlabMergeRequest {
    iid: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    source_branch: String,
    target_branch: String,
    #[serde(default)]
    labels: Vec<String>,
    state: String,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    squash_commit_sha: Option<String>,
}

impl From<GlabMergeRequest> for PullRequest {
    fn from(mr: GlabMergeRequest) -> Self {
        let state = match mr.state.as_str() {
            "merged" => PrState::Merged,
            "closed" | "locked" => PrState::Closed,
            _ => PrState::Open,
        };
        Self {
            number: mr.iid,
            title: mr.title,
            body: mr.description.unwrap_or_default(),
            head: mr.source_branch,
            base: mr.target_branch,
            labels: mr.labels,
            state,
            url: mr.web_url,
            merge_sha: mr.merge_commit_sha.or(mr.squash_commit_sha),
        }
    }
}

/// Parse `glab mr list --output json` output.
///
/// # Errors
///
/// Returns [`Error::Json`] when the output is not the expected shape.
pub fn parse_mr_list(json: &str) -> Result<Vec<PullRequest>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mrs: Vec<GlabMergeRequest> = serde_json::from_str(trimmed)?;
    Ok(mrs.into_iter().map(Into::into).collect())
}

#[async_trait]
impl Forge for GlabForge {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn is_available(&self) -> bool {
        match self.glab().args(["auth", "status"]).run().await {
            Ok(out) => out.success,
            Err(e) => {
                warn!(error = %e, "glab is not available");
                false
            }
        }
    }

    async fn create_pr(&self, draft: &PullRequestDraft) -> Result<PullRequest> {
        let mut cmd = self.glab().args([
            "mr",
            "create",
            "--title",
            draft.title.as_str(),
            "--description",
            draft.body.as_str(),
            "--source-branch",
            draft.head.as_str(),
            "--target-branch",
            draft.base.as_str(),
            "--yes",
        ]);
        if !draft.labels.is_empty() {
            cmd = cmd.args(["--label".to_string(), draft.labels.join(",")]);
        }
        let out = self.run(cmd).await?;
        let number = number_from_url(&out.stdout).ok_or_else(|| {
            Error::backend(BACKEND, format!("could not read MR number from: {}", out.stdout.trim()))
        })?;
        info!(number, head = %draft.head, "Opened merge request");
        Ok(PullRequest {
            number,
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

    async fn update_pr(&self, number: u64, draft: &PullRequestDraft) -> Result<()> {
        let number = number.to_string();
        self.run(self.glab().args([
            "mr",
            "update",
            number.as_str(),
            "--title",
            draft.title.as_str(),
            "--description",
            draft.body.as_str(),
            "--yes",
        ]))
        .await?;
        Ok(())
    }

    async fn list_prs(&self, label: &str, state: PrState) -> Result<Vec<PullRequest>> {
        let mut cmd = self
            .glab()
            .args(["mr", "list", "--label", label, "--output", "json", "--per-page", "100"]);
        match state {
            PrState::Open => {}
            PrState::Merged => cmd = cmd.arg("--merged"),
            PrState::Closed => cmd = cmd.arg("--closed"),
            PrState::All => cmd = cmd.arg("--all"),
        }
        let out = self.run(cmd).await?;
        parse_mr_list(&out.stdout)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let number = number.to_string();
        let joined = labels.join(",");
        let args = ["mr", "update", number.as_str(), "--label", joined.as_str(), "--yes"];
        self.run(self.glab().args(args)).await?;
        Ok(())
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let number = number.to_string();
        let joined = labels.join(",");
        let args = ["mr", "update", number.as_str(), "--unlabel", joined.as_str(), "--yes"];
        self.run(self.glab().args(args)).await?;
        Ok(())
    }

    async fn create_release(&self, draft: &ReleaseDraft) -> Result<()> {
        if draft.prerelease {
            debug!(tag = %draft.tag, "GitLab has no prerelease flag, creating a regular release");
        }
        self.run(self.glab().args([
            "release",
            "create",
            draft.tag.as_str(),
            "--name",
            draft.title.as_str(),
            "--notes",
            draft.notes.as_str(),
        ]))
        .await?;
        info!(tag = %draft.tag, "Created GitLab release");
        Ok(())
    }

    async fn delete_release(&self, tag: &str) -> Result<()> {
        let out = self.glab().args(["release", "delete", tag, "--yes"]).run().await?;
        if out.success || not_found(&out) {
            Ok(())
        } else {
            Err(Error::backend(
                BACKEND,
                format!("failed to delete release {tag}: {}", out.summary()),
            ))
        }
    }

    async fn release_exists(&self, tag: &str) -> Result<bool> {
        let out = self.glab().args(["release", "view", tag]).run().await?;
        if out.success {
            Ok(true)
        } else if not_found(&out) {
            Ok(false)
        } else {
            Err(Error::backend(BACKEND, out.summary()))
        }
    }

    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<()> {
        let file = path.to_string_lossy();
        self.run(self.glab().args(["release", "upload", tag, file.as_ref()]))
            .await?;
        Ok(())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Option<u64>> {
        let mut cmd = self
            .glab()
            .args(["issue", "create", "--title", title, "--description", body, "--yes"]);
        if !labels.is_empty() {
            cmd = cmd.args(["--label".to_string(), labels.join(",")]);
        }
        let out = self.run(cmd).await?;
        Ok(number_from_url(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_from_url() {
        assert_eq!(
            number_from_url(
                "Creating merge request for x into main\n\n\
                 https://gitlab.com/acme/w/-/merge_requests/9\n"
            ),
            Some(9)
        );
        assert_eq!(number_from_url("nothing"), None);
    }

    #[test]
    fn test_parse_mr_list() {
        let json = r#"[
            {"iid": 3, "title": "chore(release): rs", "description": "plan",
             "source_branch": "releasekit--release--rs", "target_branch": "main",
             "labels": ["autorelease: pending"], "state": "merged",
             "web_url": "https://gitlab.com/acme/w/-/merge_requests/3",
             "merge_commit_sha": null, "squash_commit_sha": "def"},
            {"iid": 4, "title": "t", "description": null,
             "source_branch": "h", "target_branch": "main", "state": "opened"}
        ]"#;
        let prs = parse_mr_list(json).unwrap();
        assert_eq!(prs[0].number, 3);
        assert_eq!(prs[0].state, PrState::Merged);
        assert_eq!(prs[0].merge_sha.as_deref(), Some("def"));
        assert_eq!(prs[1].state, PrState::Open);
        assert!(prs[1].body.is_empty());
        assert!(parse_mr_list("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_not_found_detection() {
        let out = CommandOutput::failed(1, "ERROR: 404 Not Found");
        assert!(not_found(&out));
        assert!(!not_found(&CommandOutput::failed(1, "401 Unauthorized")));
    }
}
