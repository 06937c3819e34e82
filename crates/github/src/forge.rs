//! [`Forge`] implementation backed by the `gh` CLI.

use async_trait::async_trait;
use releasekit_release::{
    Cmd, CommandOutput, Error, Forge, PrState, PullRequest, PullRequestDraft, ReleaseDraft, Result,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BACKEND: &str = "github";
const PR_FIELDS: &str = "number,title,body,headRefName,baseRefName,labels,state,url,mergeCommit";

/// GitHub forge driven through `gh`.
#[derive(Debug, Clone)]
pub struct GhForge {
    program: String,
    root: PathBuf,
    repo: Option<String>,
}

impl GhForge {
    /// Run `gh` from `root`, targeting the repository `gh` infers there.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            program: "gh".to_string(),
            root: root.into(),
            repo: None,
        }
    }

    /// Target `owner/repo` explicitly.
    #[must_use]
    pub fn with_repo(mut self, owner: impl AsRef<str>, repo: impl AsRef<str>) -> Self {
        self.repo = Some(format!("{}/{}", owner.as_ref(), repo.as_ref()));
        self
    }

    /// Use a different `gh` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn gh(&self) -> Cmd {
        let cmd = Cmd::new(&self.program).current_dir(&self.root);
        match &self.repo {
            Some(repo) => cmd.env("GH_REPO", repo),
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

    /// Create `label` if it does not exist yet.
    async fn ensure_label(&self, label: &str) {
        let cmd = self
            .gh()
            .args(["label", "create", label, "--color", "ededed", "--force"]);
        match cmd.run().await {
            Ok(out) if out.success => {}
            Ok(out) => debug!(label, error = %out.summary(), "Could not create label"),
            Err(e) => debug!(label, error = %e, "Could not create label"),
        }
    }
}

/// Extract the trailing number from a pull request or issue URL printed by
/// `gh` (`https://github.com/o/r/pull/12`).
#[must_use]
pub fn number_from_url(output: &str) -> Option<u64> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("http"))?
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    body: String,
    head_ref_name: String,
    base_ref_name: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    state: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    merge_commit: Option<GhCommit>,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    oid: String,
}

impl From<GhPullRequest> for PullRequest {
    fn from(pr: GhPullRequest) -> Self {
        let state = match pr.state.to_ascii_uppercase().as_str() {
            "MERGED" => PrState::Merged,
            "CLOSED" => PrState::Closed,
            _ => PrState::Open,
        };
        Self {
            number: pr.number,
            title: pr.title,
            body: pr.body,
            head: pr.head_ref_name,
            base: pr.base_ref_name,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            state,
            url: pr.url,
            merge_sha: pr.merge_commit.map(|c| c.oid),
        }
    }
}

/// Parse `gh pr list --json` output.
///
/// # Errors
///
/// Returns [`Error::Json`] when the output is not the expected shape.
pub fn parse_pr_list(json: &str) -> Result<Vec<PullRequest>> {
    let prs: Vec<GhPullRequest> = serde_json::from_str(json)?;
    Ok(prs.into_iter().map(Into::into).collect())
}

#[async_trait]
impl Forge for GhForge {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn is_available(&self) -> bool {
        match self.gh().args(["auth", "status"]).run().await {
            Ok(out) => out.success,
            Err(e) => {
                warn!(error = %e, "gh is not available");
                false
            }
        }
    }

    async fn create_pr(&self, draft: &PullRequestDraft) -> Result<PullRequest> {
        for label in &draft.labels {
            self.ensure_label(label).await;
        }
        let mut cmd = self.gh().args([
            "pr",
            "create",
            "--title",
            draft.title.as_str(),
            "--body",
            draft.body.as_str(),
            "--head",
            draft.head.as_str(),
            "--base",
            draft.base.as_str(),
        ]);
        for label in &draft.labels {
            cmd = cmd.args(["--label", label.as_str()]);
        }
        let out = self.run(cmd).await?;
        let number = number_from_url(&out.stdout).ok_or_else(|| {
            Error::backend(BACKEND, format!("could not read PR number from: {}", out.stdout.trim()))
        })?;
        info!(number, head = %draft.head, "Opened pull request");
        Ok(PullRequest {
            number,
            title: draft.title.clone(),
            body: draft.body.clone(),
            head: draft.head.clone(),
            base: draft.base.clone(),
            labels: draft.labels.clone(),
            state: PrState::Open,
            url: Some(out.stdout.trim().to_string()),
            merge_sha: None,
        })
    }

    async fn update_pr(&self, number: u64, draft: &PullRequestDraft) -> Result<()> {
        let number = number.to_string();
        self.run(self.gh().args([
            "pr",
            "edit",
            number.as_str(),
            "--title",
            draft.title.as_str(),
            "--body",
            draft.body.as_str(),
        ]))
        .await?;
        Ok(())
    }

    async fn list_prs(&self, label: &str, state: PrState) -> Result<Vec<PullRequest>> {
        let out = self
            .run(self.gh().args([
                "pr",
                "list",
                "--label",
                label,
                "--state",
                state.as_str(),
                "--json",
                PR_FIELDS,
                "--limit",
                "100",
            ]))
            .await?;
        parse_pr_list(&out.stdout)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        for label in labels {
            self.ensure_label(label).await;
        }
        let number = number.to_string();
        let joined = labels.join(",");
        self.run(self.gh().args(["pr", "edit", number.as_str(), "--add-label", joined.as_str()]))
            .await?;
        Ok(())
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let number = number.to_string();
        let joined = labels.join(",");
        self.run(self.gh().args(["pr", "edit", number.as_str(), "--remove-label", joined.as_str()]))
            .await?;
        Ok(())
    }

    async fn create_release(&self, draft: &ReleaseDraft) -> Result<()> {
        let mut cmd = self.gh().args([
            "release",
            "create",
            draft.tag.as_str(),
            "--title",
            draft.title.as_str(),
            "--notes",
            draft.notes.as_str(),
            "--verify-tag",
        ]);
        if draft.prerelease {
            cmd = cmd.arg("--prerelease");
        }
        self.run(cmd).await?;
        info!(tag = %draft.tag, "Created GitHub release");
        Ok(())
    }

    async fn delete_release(&self, tag: &str) -> Result<()> {
        let out = self.gh().args(["release", "delete", tag, "--yes"]).run().await?;
        if out.success || out.stderr.contains("release not found") {
            Ok(())
        } else {
            Err(Error::backend(
                BACKEND,
                format!("failed to delete release {tag}: {}", out.summary()),
            ))
        }
    }

    async fn release_exists(&self, tag: &str) -> Result<bool> {
        let out = self.gh().args(["release", "view", tag, "--json", "tagName"]).run().await?;
        if out.success {
            Ok(true)
        } else if out.stderr.contains("release not found") {
            Ok(false)
        } else {
            Err(Error::backend(BACKEND, out.summary()))
        }
    }

    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<()> {
        let file = path.to_string_lossy();
        self.run(self.gh().args(["release", "upload", tag, file.as_ref(), "--clobber"]))
            .await?;
        Ok(())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Option<u64>> {
        for label in labels {
            self.ensure_label(label).await;
        }
        let mut cmd = self.gh().args(["issue", "create", "--title", title, "--body", body]);
        for label in labels {
            cmd = cmd.args(["--label", label.as_str()]);
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
            number_from_url("Creating pull request\nhttps://github.com/acme/w/pull/42\n"),
            Some(42)
        );
        assert_eq!(number_from_url("https://github.com/acme/w/issues/7/"), Some(7));
        assert_eq!(number_from_url("no url here"), None);
    }

    #[test]
    fn test_parse_pr_list() {
        let json = r#"[
            {
                "number": 12,
                "title": "chore(release): rs (2 packages)",
                "body": "plan",
                "headRefName": "releasekit--release--rs",
                "baseRefName": "main",
                "labels": [{"id": "x", "name": "autorelease: pending"}],
                "state": "MERGED",
                "url": "https://github.com/acme/w/pull/12",
                "mergeCommit": {"oid": "abc123"}
            },
            {
                "number": 13,
                "title": "t",
                "headRefName": "h",
                "baseRefName": "main",
                "labels": [],
                "state": "OPEN",
                "mergeCommit": null
            }
        ]"#;
        let prs = parse_pr_list(json).unwrap();
        assert_eq!(prs.len(), 2);
        assert_eq!(prs[0].state, PrState::Merged);
        assert_eq!(prs[0].labels, vec!["autorelease: pending"]);
        assert_eq!(prs[0].merge_sha.as_deref(), Some("abc123"));
        assert_eq!(prs[1].state, PrState::Open);
        assert!(prs[1].body.is_empty());
        assert!(prs[1].merge_sha.is_none());
    }

    #[test]
    fn test_parse_pr_list_rejects_garbage() {
        assert!(parse_pr_list("not json").is_err());
    }
}
