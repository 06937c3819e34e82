//! pnpm and npm.

use crate::util::{package_dir, run_steps, scratch, with_artifacts};
use async_trait::async_trait;
use releasekit_release::{Cmd, CommandOutput, PackageManager, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};

/// Which JavaScript client drives the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClient {
    /// pnpm. Rewrites `workspace:` ranges when packing.
    Pnpm,
    /// npm.
    Npm,
}

impl NodeClient {
    const fn program(self) -> &'static str {
        match self {
            Self::Pnpm => "pnpm",
            Self::Npm => "npm",
        }
    }
}

/// pnpm / npm driver.
#[derive(Debug, Clone)]
pub struct NodeTool {
    client: NodeClient,
    program: String,
    npm: String,
}

impl NodeTool {
    /// Drive `client` from PATH.
    #[must_use]
    pub fn new(client: NodeClient) -> Self {
        Self {
            client,
            program: client.program().to_string(),
            npm: "npm".to_string(),
        }
    }

    /// Use a different client binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn tool(&self) -> Cmd {
        Cmd::new(&self.program)
    }
}

#[async_trait]
impl PackageManager for NodeTool {
    fn name(&self) -> &str {
        self.client.program()
    }

    async fn build(&self, package: &Package, out_dir: &Path) -> Result<CommandOutput> {
        std::fs::create_dir_all(out_dir)?;
        let dest = out_dir.to_string_lossy();
        let output = self
            .tool()
            .current_dir(package_dir(package))
            .args(["pack", "--pack-destination", dest.as_ref()])
            .run()
            .await?;
        with_artifacts(output, out_dir, &[".tgz"])
    }

    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput> {
        let mut cmd = self.tool().current_dir(package_dir(package)).arg("publish");
        if let Some(tarball) = artifacts.first() {
            cmd = cmd.arg(tarball.to_string_lossy());
        }
        cmd = cmd.args(["--access", "public"]);
        if self.client == NodeClient::Pnpm {
            cmd = cmd.arg("--no-git-checks");
        }
        if dry_run {
            cmd = cmd.arg("--dry-run");
        }
        cmd.run().await
    }

    async fn lock(&self, root: &Path) -> Result<CommandOutput> {
        let flag = match self.client {
            NodeClient::Pnpm => "--lockfile-only",
            NodeClient::Npm => "--package-lock-only",
        };
        self.tool().current_dir(root).args(["install", flag]).run().await
    }

    async fn version_bump(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        Cmd::new(&self.npm)
            .current_dir(package_dir(package))
            .args(["version", version, "--no-git-tag-version", "--allow-same-version"])
            .run()
            .await
    }

    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        let dir = scratch("releasekit-smoke-")?;
        std::fs::write(
            dir.path().join("package.json"),
            "{\"name\": \"releasekit-smoke\", \"private\": true}\n",
        )?;
        let spec = format!("{}@{version}", package.name);
        let import = format!("await import('{}')", package.name);
        run_steps(vec![
            Cmd::new(&self.npm)
                .current_dir(dir.path())
                .args(["install", "--no-save", spec.as_str()]),
            Cmd::new("node")
                .current_dir(dir.path())
                .args(["--input-type=module", "-e", import.as_str()]),
        ])
        .await
    }
}
