//! Commit windows per package.
//!
//! For each package the analyzer reads the commits since its last release
//! tag, keeps the ones whose changed files belong to it (the longest package
//! path containing a file owns that file), parses them, and nets out
//! reverts.

use crate::backends::Vcs;
use crate::changeset::BumpType;
use crate::conventional::{CommitParser, ParsedCommit, net_bump, surviving};
use crate::error::Result;
use crate::planner::DirectBump;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A package as the analyzer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageWindow {
    /// Package name.
    pub name: String,
    /// Directory relative to the repository root.
    pub path: PathBuf,
    /// Last release tag; `None` reads the whole history.
    pub since: Option<String>,
}

/// Parsed commits of one package window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageCommits {
    /// Parsed commits, newest first.
    pub commits: Vec<ParsedCommit>,
    /// Net bump after revert cancellation.
    pub bump: BumpType,
    /// Commits that did not parse.
    pub unparsed: usize,
}

impl PackageCommits {
    /// Commits that survive revert cancellation and carry a bump, formatted
    /// as `<short sha> <header>`.
    #[must_use]
    pub fn contributing(&self) -> Vec<String> {
        surviving(&self.commits)
            .into_iter()
            .filter(|c| c.bump().is_some())
            .map(|c| format!("{} {}", short_sha(&c.sha), c.header()))
            .collect()
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Owner of `file` among `packages` by longest path prefix.
#[must_use]
pub fn owner_of<'a>(file: &Path, packages: &'a [PackageWindow]) -> Option<&'a str> {
    packages
        .iter()
        .filter(|p| is_root(&p.path) || file.starts_with(&p.path))
        .max_by_key(|p| if is_root(&p.path) { 0 } else { p.path.components().count() })
        .map(|p| p.name.as_str())
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new(".")
}

/// Reads and classifies commits through a [`Vcs`].
pub struct CommitAnalyzer<'a> {
    vcs: &'a dyn Vcs,
    parser: &'a dyn CommitParser,
}

impl<'a> CommitAnalyzer<'a> {
    /// Create an analyzer.
    #[must_use]
    pub fn new(vcs: &'a dyn Vcs, parser: &'a dyn CommitParser) -> Self {
        Self { vcs, parser }
    }

    /// The tag to read history from for a package at `current_tag`, or
    /// `None` when the tag does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a git error if the tag lookup fails.
    pub async fn since_tag(&self, current_tag: &str) -> Result<Option<String>> {
        if self.vcs.tag_exists(current_tag).await? {
            Ok(Some(current_tag.to_string()))
        } else {
            info!(tag = current_tag, "No release tag yet, reading full history");
            Ok(None)
        }
    }

    /// Analyze every package window.
    ///
    /// # Errors
    ///
    /// Returns a git error if a log cannot be read.
    pub async fn analyze(
        &self,
        packages: &[PackageWindow],
    ) -> Result<BTreeMap<String, PackageCommits>> {
        if self.vcs.is_shallow().await? {
            warn!("Repository is a shallow clone; commit windows may be incomplete");
        }

        let mut out = BTreeMap::new();
        for window in packages {
            let paths = if is_root(&window.path) {
                Vec::new()
            } else {
                vec![window.path.clone()]
            };
            let records = self.vcs.log_since(window.since.as_deref(), &paths).await?;

            let mut analysis = PackageCommits::default();
            for record in records {
                let owned = record.files.is_empty()
                    || record
                        .files
                        .iter()
                        .any(|f| owner_of(f, packages) == Some(window.name.as_str()));
                if !owned {
                    continue;
                }
                match self.parser.parse_commit(&record.sha, &record.message) {
                    Some(commit) => {
                        debug!(
                            package = %window.name,
                            sha = short_sha(&record.sha),
                            classification = %commit.classification(),
                            "Classified commit"
                        );
                        analysis.commits.push(commit);
                    }
                    None => {
                        warn!(
                            package = %window.name,
                            sha = short_sha(&record.sha),
                            "Commit message is not a conventional commit, ignoring"
                        );
                        analysis.unparsed += 1;
                    }
                }
            }
            analysis.bump = net_bump(&analysis.commits);
            out.insert(window.name.clone(), analysis);
        }
        Ok(out)
    }
}

/// Merge commit analysis with changeset bumps (maximum wins).
#[must_use]
pub fn direct_bumps(
    commits: &BTreeMap<String, PackageCommits>,
    changesets: &BTreeMap<String, (BumpType, Vec<String>)>,
) -> BTreeMap<String, DirectBump> {
    let mut out: BTreeMap<String, DirectBump> = BTreeMap::new();
    for (name, analysis) in commits {
        if analysis.bump.is_some() {
            out.insert(
                name.clone(),
                DirectBump {
                    bump: analysis.bump,
                    commits: analysis.contributing(),
                    changesets: Vec::new(),
                },
            );
        }
    }
    for (name, (bump, ids)) in changesets {
        let entry = out.entry(name.clone()).or_default();
        entry.bump = entry.bump.max(*bump);
        entry.changesets.extend(ids.iter().cloned());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::FakeVcs;
    use crate::conventional::StrictParser;

    fn window(name: &str, path: &str, since: Option<&str>) -> PackageWindow {
        PackageWindow {
            name: name.to_string(),
            path: PathBuf::from(path),
            since: since.map(str::to_string),
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let packages = [
            window("root", "", None),
            window("core", "py/packages/core", None),
            window("core-ext", "py/packages/core/ext", None),
        ];
        assert_eq!(owner_of(Path::new("py/packages/core/src/a.py"), &packages), Some("core"));
        assert_eq!(owner_of(Path::new("py/packages/core/ext/b.py"), &packages), Some("core-ext"));
        assert_eq!(owner_of(Path::new("README.md"), &packages), Some("root"));
        // Component-wise, not string prefix.
        assert_eq!(owner_of(Path::new("py/packages/core2/x.py"), &packages), Some("root"));
    }

    #[tokio::test]
    async fn test_analyze_windows() {
        let vcs = FakeVcs::new();
        vcs.commit("a000001", "feat: initial", &["core/src/lib.rs"]);
        vcs.seed_tag("core-v1.0.0");
        vcs.commit("b000002", "fix(core): crash", &["core/src/lib.rs"]);
        vcs.commit("c000003", "wip things", &["core/src/lib.rs"]);
        vcs.commit("d000004", "feat(app): new page", &["app/src/main.rs"]);
        vcs.commit("e000005", "Revert \"fix(core): crash\"", &["core/src/lib.rs"]);
        vcs.commit("f000006", "perf: faster", &["app/src/main.rs", "core/src/lib.rs"]);

        let parser = StrictParser::default();
        let analyzer = CommitAnalyzer::new(&vcs, &parser);
        let since = analyzer.since_tag("core-v1.0.0").await.unwrap();
        assert_eq!(since.as_deref(), Some("core-v1.0.0"));
        assert_eq!(analyzer.since_tag("app-v1.0.0").await.unwrap(), None);

        let windows = [window("core", "core", since.as_deref()), window("app", "app", None)];
        let result = analyzer.analyze(&windows).await.unwrap();

        let core = &result["core"];
        assert_eq!(core.unparsed, 1);
        assert_eq!(core.bump, BumpType::Patch);
        assert_eq!(core.contributing(), vec!["f000006 perf: faster"]);

        let app = &result["app"];
        assert_eq!(app.bump, BumpType::Minor);
        assert_eq!(app.commits.len(), 2);
    }

    #[test]
    fn test_direct_bumps_merge_changesets() {
        let mut commits = BTreeMap::new();
        commits.insert(
            "core".to_string(),
            PackageCommits {
                commits: Vec::new(),
                bump: BumpType::Patch,
                unparsed: 0,
            },
        );
        let changesets = BTreeMap::from([
            ("core".to_string(), (BumpType::Minor, vec!["cs-1".to_string()])),
            ("docs".to_string(), (BumpType::Patch, vec!["cs-2".to_string()])),
        ]);
        let direct = direct_bumps(&commits, &changesets);
        assert_eq!(direct["core"].bump, BumpType::Minor);
        assert_eq!(direct["core"].changesets, vec!["cs-1"]);
        assert_eq!(direct["docs"].bump, BumpType::Patch);
    }
}
