//! Cargo.

use crate::util::{package_dir, run_steps, scratch, with_artifacts};
use async_trait::async_trait;
use releasekit_release::{Cmd, CommandOutput, PackageManager, Result};
use releasekit_workspaces::Package;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cargo driver.
#[derive(Debug, Clone)]
pub struct Cargo {
    program: String,
}

impl Default for Cargo {
    fn default() -> Self {
        Self::new()
    }
}

impl Cargo {
    /// Drive the `cargo` on PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "cargo".to_string(),
        }
    }

    /// Use a different cargo binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn cargo(&self) -> Cmd {
        Cmd::new(&self.program)
    }
}

#[async_trait]
impl PackageManager for Cargo {
    fn name(&self) -> &str {
        "cargo"
    }

    /// `cargo package` into `<out_dir>/package/<name>-<version>.crate`.
    /// Pinned manifests leave the tree dirty, hence `--allow-dirty`.
    async fn build(&self, package: &Package, out_dir: &Path) -> Result<CommandOutput> {
        let target = out_dir.to_string_lossy();
        let output = self
            .cargo()
            .current_dir(package_dir(package))
            .args(["package", "--allow-dirty", "--no-verify", "--target-dir", target.as_ref()])
            .run()
            .await?;
        with_artifacts(output, &out_dir.join("package"), &[".crate"])
    }

    async fn publish(
        &self,
        package: &Package,
        _artifacts: &[PathBuf],
        dry_run: bool,
    ) -> Result<CommandOutput> {
        let mut cmd = self
            .cargo()
            .current_dir(package_dir(package))
            .args(["publish", "--allow-dirty", "--no-verify"]);
        if dry_run {
            cmd = cmd.arg("--dry-run");
        }
        cmd.run().await
    }

    async fn lock(&self, root: &Path) -> Result<CommandOutput> {
        self.cargo()
            .current_dir(root)
            .args(["update", "--workspace"])
            .run()
            .await
    }

    async fn version_bump(&self, package: &Package, _version: &str) -> Result<CommandOutput> {
        debug!(package = %package.name, "Cargo has no version command, rewriting Cargo.toml");
        Ok(crate::no_version_command("cargo"))
    }

    async fn smoke_test(&self, package: &Package, version: &str) -> Result<CommandOutput> {
        let dir = scratch("releasekit-smoke-")?;
        let manifest = format!(
            "[package]\nname = \"releasekit-smoke\"\nversion = \"0.0.0\"\n\
             edition = \"2021\"\npublish = false\n\n\
             [dependencies]\n{} = \"={version}\"\n\n[workspace]\n",
            package.name
        );
        std::fs::create_dir_all(dir.path().join("src"))?;
        std::fs::write(dir.path().join("Cargo.toml"), manifest)?;
        std::fs::write(
            dir.path().join("src/lib.rs"),
            format!("pub use {} as _;\n", crate::util::import_name(&package.name)),
        )?;
        run_steps(vec![self.cargo().current_dir(dir.path()).args(["check", "--quiet"])]).await
    }
}
