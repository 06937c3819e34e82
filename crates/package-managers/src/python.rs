//! uv.

use crate::util::{import_name, package_dir, run_steps, scratch, with_artifacts};
use async_trait::async_trait;
use releasekit_release::{Cmd, CommandOutput, PackageManager, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};

/// uv driver. Builds an sdist and wheel per package and uploads them with
/// `uv publish`, which reads `UV_PUBLISH_TOKEN` in CI.
#[derive(Debug, Clone)]
pub struct Uv {
    program: String,
}

impl Default for Uv {
    fn default() -> Self {
        Self::new()
    }
}

impl Uv {
    /// Drive the `uv` on PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "uv".to_string(),
        }
    }

    /// Use a different uv binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn uv(&self) -> Cmd {
        Cmd::new(&self.program)
    }
}

#[async_trait]
impl PackageManager for Uv {
    fn name(&self) -> &str {
        "uv"
    }

    async fn build(&self, package: &Package, out_dir: &Path) -> Result<CommandOutput> {
        let dest = out_dir.to_string_lossy();
        let output = self
            .uv()
            .current_dir(package_dir(package))
            .args(["build", "--out-dir", dest.as_ref()])
            .run()
            .await?;
        with_artifacts(output, out_dir, &[".whl", ".tar.gz"])
    }

    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput> {
        let mut cmd = self.uv().current_dir(package_dir(package)).arg("publish");
        if dry_run {
            cmd = cmd.arg("--dry-run");
        }
        cmd.args(artifacts.iter().map(|a| a.to_string_lossy().into_owned()))
            .run()
            .await
    }

    async fn lock(&self, root: &Path) -> Result<CommandOutput> {
        self.uv().current_dir(root).arg("lock").run().await
    }

    async fn version_bump(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        self.uv()
            .current_dir(package_dir(package))
            .args(["version", version, "--frozen"])
            .run()
            .await
    }

    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        let dir = scratch("releasekit-smoke-")?;
        let requirement = format!("{}=={version}", package.name);
        let import = format!("import {}", import_name(&package.name));
        run_steps(vec![self.uv().current_dir(dir.path()).args([
            "run",
            "--isolated",
            "--no-project",
            "--with",
            requirement.as_str(),
            "python",
            "-c",
            import.as_str(),
        ])])
        .await
    }
}
