//! Conventional commit parsing and bump classification.
//!
//! Parsing uses the `git-conventional` crate. Two strategies share the
//! grammar: [`StrictParser`] accepts only an allow-list of types, and
//! [`OpenParser`] accepts any type. Malformed messages yield `None`, never
//! an error, so one bad commit cannot block a release.

use crate::changeset::BumpType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Types accepted by [`StrictParser::default`].
pub const DEFAULT_ALLOWED_TYPES: [&str; 11] = [
    "feat", "fix", "perf", "build", "ci", "docs", "refactor", "style", "test", "chore", "revert",
];

static REVERTS_COMMIT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)This reverts commit ([0-9a-f]{7,40})").ok());

const BREAKING_TOKENS: [&str; 2] = ["BREAKING CHANGE", "BREAKING-CHANGE"];

/// A parsed conventional commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommit {
    /// Full or abbreviated commit hash. Empty when parsed from a bare message.
    pub sha: String,
    /// Lowercased commit type (`feat`, `fix`, `revert`, ...).
    pub commit_type: String,
    /// Optional scope.
    pub scope: Option<String>,
    /// Header description.
    pub description: String,
    /// Optional body.
    pub body: Option<String>,
    /// Footer token/value pairs in message order.
    pub footers: Vec<(String, String)>,
    /// Whether this commit declares a breaking change.
    pub breaking: bool,
    /// Whether this commit reverts another.
    pub is_revert: bool,
    /// Bump of the reverted commit, when it could be classified.
    pub reverted_bump: Option<BumpType>,
    /// Hash named by a `This reverts commit <sha>` body line.
    pub reverted_sha: Option<String>,
    /// Header of the reverted commit.
    pub reverted_header: Option<String>,
    /// The header line exactly as written.
    #[serde(default)]
    pub subject: String,
}

impl ParsedCommit {
    /// The bump this commit contributes. Reverts contribute nothing on their
    /// own; see [`net_bump`] for how they cancel the commits they revert.
    #[must_use]
    pub fn bump(&self) -> BumpType {
        if self.is_revert {
            return BumpType::None;
        }
        if self.breaking {
            return BumpType::Major;
        }
        match self.commit_type.as_str() {
            "feat" => BumpType::Minor,
            "fix" | "perf" => BumpType::Patch,
            _ => BumpType::None,
        }
    }

    /// Human-readable classification, e.g. `minor` or `revert-of-minor`.
    #[must_use]
    pub fn classification(&self) -> String {
        if self.is_revert {
            format!("revert-of-{}", self.reverted_bump.unwrap_or_default())
        } else {
            self.bump().to_string()
        }
    }

    /// The header line as written, which is what `git revert` quotes.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.subject
    }
}

/// Turns raw commit messages into [`ParsedCommit`]s.
pub trait CommitParser: Send + Sync {
    /// Whether `commit_type` (already lowercased) is accepted.
    fn accepts_type(&self, commit_type: &str) -> bool;

    /// Parse a message without an associated hash.
    fn parse(&self, message: &str) -> Option<ParsedCommit> {
        self.parse_commit("", message)
    }

    /// Parse a message belonging to commit `sha`.
    fn parse_commit(&self, sha: &str, message: &str) -> Option<ParsedCommit> {
        let message = message.trim();
        if let Some(revert) = parse_forge_revert(self, sha, message) {
            return Some(revert);
        }

        let commit = parse_conventional(sha, message)?;
        if commit.commit_type == "revert" {
            return Some(into_revert(self, commit));
        }
        self.accepts_type(&commit.commit_type).then_some(commit)
    }
}

/// Accepts only an allow-list of commit types.
#[derive(Debug, Clone)]
pub struct StrictParser {
    allowed: HashSet<String>,
}

impl StrictParser {
    /// Create a strict parser with a custom allow-list.
    #[must_use]
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: types
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl Default for StrictParser {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_TYPES)
    }
}

impl CommitParser for StrictParser {
    fn accepts_type(&self, commit_type: &str) -> bool {
        self.allowed.contains(commit_type)
    }
}

/// Accepts any commit type.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenParser;

impl CommitParser for OpenParser {
    fn accepts_type(&self, _commit_type: &str) -> bool {
        true
    }
}

/// Parse the grammar proper. Falls back to the header line alone when the
/// body is not separated by a blank line.
fn parse_conventional(sha: &str, message: &str) -> Option<ParsedCommit> {
    if let Ok(parsed) = git_conventional::Commit::parse(message) {
        let footers: Vec<(String, String)> = parsed
            .footers()
            .iter()
            .map(|f| (f.token().to_string(), f.value().to_string()))
            .collect();
        let breaking = parsed.breaking()
            || footers
                .iter()
                .any(|(token, _)| BREAKING_TOKENS.contains(&token.as_str()));
        return Some(ParsedCommit {
            sha: sha.to_string(),
            commit_type: parsed.type_().to_string().to_lowercase(),
            scope: parsed.scope().map(|s| s.to_string()),
            description: parsed.description().to_string(),
            body: parsed.body().map(|b| b.to_string()),
            footers,
            breaking,
            is_revert: false,
            reverted_bump: None,
            reverted_sha: None,
            reverted_header: None,
            subject: message.lines().next().unwrap_or_default().trim().to_string(),
        });
    }

    let (header, rest) = message.split_once('\n')?;
    let mut commit = parse_conventional(sha, header.trim())?;
    let rest = rest.trim();
    commit.body = (!rest.is_empty()).then(|| rest.to_string());
    Some(commit)
}

/// `Revert "<header>"`, the default message of forge and `git revert`.
fn parse_forge_revert<P: CommitParser + ?Sized>(
    parser: &P,
    sha: &str,
    message: &str,
) -> Option<ParsedCommit> {
    let (first, rest) = message.split_once('\n').unwrap_or((message, ""));
    let inner = first
        .trim()
        .strip_prefix("Revert \"")?
        .strip_suffix('"')?
        .to_string();
    let body = rest.trim();

    Some(ParsedCommit {
        sha: sha.to_string(),
        commit_type: "revert".to_string(),
        scope: None,
        description: inner.clone(),
        body: (!body.is_empty()).then(|| body.to_string()),
        footers: Vec::new(),
        breaking: false,
        is_revert: true,
        reverted_bump: Some(parser.parse(&inner).map_or(BumpType::None, |c| c.bump())),
        reverted_sha: reverted_sha(body),
        reverted_header: Some(inner),
        subject: first.trim().to_string(),
    })
}

/// `revert: <header>`: the description is the reverted header.
fn into_revert<P: CommitParser + ?Sized>(parser: &P, mut commit: ParsedCommit) -> ParsedCommit {
    let inner = commit.description.clone();
    commit.is_revert = true;
    commit.reverted_bump = Some(parser.parse(&inner).map_or(BumpType::None, |c| c.bump()));
    commit.reverted_sha = commit.body.as_deref().and_then(reverted_sha);
    commit.reverted_header = Some(inner);
    commit
}

fn reverted_sha(body: &str) -> Option<String> {
    let re = REVERTS_COMMIT.as_ref()?;
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn same_sha(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.starts_with(b) || b.starts_with(a))
}

/// Net bump of one release window, commits ordered newest first.
///
/// A revert cancels the older commit it names (by hash, else by identical
/// header); a cancelled revert cancels nothing. The result is the maximum
/// bump over the commits left standing.
#[must_use]
pub fn net_bump(commits: &[ParsedCommit]) -> BumpType {
    surviving(commits)
        .into_iter()
        .map(ParsedCommit::bump)
        .max()
        .unwrap_or_default()
}

/// Commits of a window (newest first) that are not cancelled by a revert.
#[must_use]
pub fn surviving(commits: &[ParsedCommit]) -> Vec<&ParsedCommit> {
    let mut cancelled = vec![false; commits.len()];

    for (i, commit) in commits.iter().enumerate() {
        if cancelled[i] || !commit.is_revert {
            continue;
        }
        let target = commits
            .iter()
            .enumerate()
            .skip(i + 1)
            .filter(|(j, _)| !cancelled[*j])
            .find(|(_, older)| match (&commit.reverted_sha, &commit.reverted_header) {
                (Some(sha), _) if same_sha(sha, &older.sha) => true,
                (_, Some(header)) => older.header().eq_ignore_ascii_case(header.trim()),
                _ => false,
            })
            .map(|(j, _)| j);
        if let Some(j) = target {
            cancelled[i] = true;
            cancelled[j] = true;
        }
    }

    commits
        .iter()
        .zip(cancelled)
        .filter(|(_, c)| !c)
        .map(|(commit, _)| commit)
        .collect()
}
