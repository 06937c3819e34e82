//! Package manager boundary (build, publish, lock, bump, smoke test).

use crate::error::Result;
use async_trait::async_trait;
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};

/// Captured result of a package manager invocation.
///
/// A non-zero exit is reported here rather than as an `Err`; `Err` is
/// reserved for failing to run the tool at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited successfully.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Files produced by a build.
    pub artifacts: Vec<PathBuf>,
}

impl CommandOutput {
    /// A successful result with no output.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// A failed result with the given stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Attach build artifacts.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Short failure description: the last non-empty stderr lines, or the
    /// exit code when stderr is empty.
    #[must_use]
    pub fn summary(&self) -> String {
        let tail: Vec<&str> = self
            .stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .rev()
            .take(5)
            .collect();
        if tail.is_empty() {
            match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            tail.into_iter().rev().collect::<Vec<_>>().join("\n")
        }
    }
}

/// Drives one ecosystem's tooling.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Tool name, e.g. `cargo` or `uv`.
    fn name(&self) -> &str;

    /// Build distributable artifacts for `package` into `out_dir`.
    async fn build(&self, package: &Package, out_dir: &Path) -> Result<CommandOutput>;

    /// Upload `artifacts` (or the package directory when empty).
    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput>;

    /// Refresh the workspace lock file.
    async fn lock(&self, root: &Path) -> Result<CommandOutput>;

    /// Set `package`'s version with the tool's own command. Implementations
    /// without one return an unsuccessful output so callers can fall back to
    /// rewriting the manifest.
    async fn version_bump(&self, package: &Package, version: &str) -> Result<CommandOutput>;

    /// Install the published version in a scratch environment and import it.
    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prefers_stderr_tail() {
        let out = CommandOutput::failed(101, "warning: x\n\nerror: no token\n");
        assert_eq!(out.summary(), "warning: x\nerror: no token");
        assert_eq!(CommandOutput::failed(2, "").summary(), "exit code 2");
    }
}
