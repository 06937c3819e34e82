//! Go modules.
//!
//! Go has no upload step: pushing the tag publishes the module, and the
//! proxy fetches it on first request. `publish` is therefore a no-op and the
//! version lives in a `VERSION` file next to `go.mod`.

use crate::util::{package_dir, run_steps, scratch};
use async_trait::async_trait;
use releasekit_release::{Cmd, CommandOutput, PackageManager, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};
use tracing::info;

/// Go toolchain driver.
#[derive(Debug, Clone)]
pub struct GoTool {
    program: String,
}

impl Default for GoTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GoTool {
    /// Drive the `go` on PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "go".to_string(),
        }
    }

    /// Use a different go binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn go(&self) -> Cmd {
        Cmd::new(&self.program)
    }
}

#[async_trait]
impl PackageManager for GoTool {
    fn name(&self) -> &str {
        "go"
    }

    async fn build(&self, package: &Package, _out_dir: &Path) -> Result<CommandOutput> {
        self.go()
            .current_dir(package_dir(package))
            .args(["build", "./..."])
            .run()
            .await
    }

    async fn publish(
        &self,
        package: &Package,
        _artifacts: &[PathBuf],
        _dry_run: bool,
    ) -> Result<CommandOutput> {
        info!(module = %package.name, "Go modules are published by their tag");
        Ok(CommandOutput::ok())
    }

    async fn lock(&self, root: &Path) -> Result<CommandOutput> {
        if root.join("go.work").exists() {
            self.go().current_dir(root).args(["work", "sync"]).run().await
        } else {
            self.go().current_dir(root).args(["mod", "tidy"]).run().await
        }
    }

    async fn version_bump(&self, _package: &Package, _version: &str) -> Result<CommandOutput> {
        Ok(crate::no_version_command("go"))
    }

    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        let dir = scratch("releasekit-smoke-")?;
        let module = format!("{}@v{}", package.name, version.trim_start_matches('v'));
        run_steps(vec![
            self.go().current_dir(dir.path()).args(["mod", "init", "releasekit.smoke"]),
            self.go().current_dir(dir.path()).args(["get", module.as_str()]),
        ])
        .await
    }
}
