//! Dart pub.

use crate::util::{package_dir, run_steps, scratch};
use async_trait::async_trait;
use releasekit_release::{Cmd, CommandOutput, PackageManager, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};

/// `dart pub` driver. pub uploads from the package directory, so `build`
/// only validates the package with a publish dry run.
#[derive(Debug, Clone)]
pub struct DartPub {
    program: String,
}

impl Default for DartPub {
    fn default() -> Self {
        Self::new()
    }
}

impl DartPub {
    /// Drive the `dart` on PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "dart".to_string(),
        }
    }

    /// Use a different dart binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn pub_cmd(&self) -> Cmd {
        Cmd::new(&self.program).arg("pub")
    }
}

#[async_trait]
impl PackageManager for DartPub {
    fn name(&self) -> &str {
        "dart"
    }

    async fn build(&self, package: &Package, _out_dir: &Path) -> Result<CommandOutput> {
        self.pub_cmd()
            .current_dir(package_dir(package))
            .args(["publish", "--dry-run"])
            .run()
            .await
    }

    async fn publish(
        &self,
        package: &Package,
        _artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput> {
        let flag = if dry_run { "--dry-run" } else { "--force" };
        self.pub_cmd()
            .current_dir(package_dir(package))
            .args(["publish", flag])
            .run()
            .await
    }

    async fn lock(&self, root: &Path) -> Result<CommandOutput> {
        self.pub_cmd().current_dir(root).arg("get").run().await
    }

    async fn version_bump(&self, _package: &Package, _version: &str) -> Result<CommandOutput> {
        Ok(crate::no_version_command("dart"))
    }

    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        let dir = scratch("releasekit-smoke-")?;
        let pubspec = format!(
            "name: releasekit_smoke\npublish_to: none\nenvironment:\n  sdk: '>=3.0.0 <4.0.0'\n\
             dependencies:\n  {}: {version}\n",
            package.name
        );
        std::fs::write(dir.path().join("pubspec.yaml"), pubspec)?;
        run_steps(vec![self.pub_cmd().current_dir(dir.path()).arg("get")]).await
    }
}
