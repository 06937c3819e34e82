//! Shared fixtures: Cargo workspaces driven through the in-memory backends.
//!
//! The default workspace is a chain (`core` <- `plugin` <- `app`); the
//! diamond has `left` and `right` both on `core` and `top` on both.

#![allow(dead_code)]

use releasekit_release::backends::fake::{FakeForge, FakePackageManager, FakeRegistry, FakeVcs};
use releasekit_release::{Backends, OrchestratorConfig, ReleaseConfig, ReleaseOrchestrator};
use releasekit_workspaces::CargoWorkspace;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub vcs: Arc<FakeVcs>,
    pub forge: Arc<FakeForge>,
    pub registry: Arc<FakeRegistry>,
    pub pm: Arc<FakePackageManager>,
    pub config: ReleaseConfig,
}

const CORE: &str = r#"[package]
name = "core"
version = "1.0.0"
edition = "2021"
"#;

const PLUGIN: &str = r#"[package]
name = "plugin"
version = "0.4.0"
edition = "2021"

[dependencies]
core = { path = "../core", version = "1.0.0" }
"#;

const APP: &str = r#"[package]
name = "app"
version = "2.0.0"
edition = "2021"

[dependencies]
plugin = { path = "../plugin", version = "0.4.0" }
serde = "1"
"#;

const LEFT: &str = r#"[package]
name = "left"
version = "0.1.0"
edition = "2021"

[dependencies]
core = { path = "../core", version = "1.0.0" }
"#;

const RIGHT: &str = r#"[package]
name = "right"
version = "0.2.0"
edition = "2021"

[dependencies]
# keep in step with core
core = { path = "../core", version = "1.0.0" }
"#;

const TOP: &str = r#"[package]
name = "top"
version = "3.0.0"
edition = "2021"

[dependencies]
left = { path = "../left", version = "0.1.0" }
right = { path = "../right", version = "0.2.0" }
"#;

impl Fixture {
    /// `publish` is spliced into the `[publish]` table, `workspace` into
    /// `[workspace.rs]`.
    pub fn new(publish: &str, workspace: &str) -> Self {
        Self::with_crates(publish, workspace, &[("core", CORE), ("plugin", PLUGIN), ("app", APP)])
    }

    /// `core` with two dependents, `left` and `right`, both needed by `top`.
    pub fn diamond(publish: &str, workspace: &str) -> Self {
        Self::with_crates(
            publish,
            workspace,
            &[("core", CORE), ("left", LEFT), ("right", RIGHT), ("top", TOP)],
        )
    }

    fn with_crates(publish: &str, workspace: &str, crates: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let members: Vec<String> = crates.iter().map(|(name, _)| format!("{name:?}")).collect();
        fs::write(
            root.join("Cargo.toml"),
            format!("[workspace]\nmembers = [{}]\n", members.join(", ")),
        )
        .unwrap();
        for (name, manifest) in crates {
            fs::create_dir_all(root.join(name).join("src")).unwrap();
            fs::write(root.join(name).join("Cargo.toml"), manifest).unwrap();
        }

        let config = ReleaseConfig::from_toml(&format!(
            r#"
forge = "github"

[publish]
retry_base_delay_ms = 1
retry_max_delay_ms = 5
poll_interval_secs = 1
poll_timeout_secs = 2
{publish}

[workspace.rs]
ecosystem = "rust"
{workspace}
"#
        ))
        .unwrap();

        let registry = Arc::new(FakeRegistry::new("crates.io"));
        Self {
            dir,
            vcs: Arc::new(FakeVcs::new()),
            forge: Arc::new(FakeForge::new()),
            pm: Arc::new(FakePackageManager::new(registry.clone())),
            registry,
            config,
        }
    }

    pub fn settings(&self) -> OrchestratorConfig {
        OrchestratorConfig::new(&self.config, "rs", self.dir.path()).unwrap()
    }

    pub fn orchestrator(&self) -> ReleaseOrchestrator {
        self.orchestrator_with(self.settings())
    }

    pub fn orchestrator_with(&self, settings: OrchestratorConfig) -> ReleaseOrchestrator {
        ReleaseOrchestrator::new(
            settings,
            Backends {
                workspace: Arc::new(CargoWorkspace),
                vcs: self.vcs.clone(),
                forge: self.forge.clone(),
                registry: self.registry.clone(),
                package_manager: self.pm.clone(),
            },
        )
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }
}
