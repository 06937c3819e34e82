//! Configuration loading and backend wiring.

use crate::cli::{CliError, CommonArgs};
use releasekit_github::GhForge;
use releasekit_gitlab::GlabForge;
use releasekit_package_managers::package_manager_for;
use releasekit_registry::registry_for;
use releasekit_release::config::PublishFrom;
use releasekit_release::{
    Backends, Forge, ForgeKind, NoForge, OrchestratorConfig, ReleaseConfig, ReleaseOrchestrator,
};
use releasekit_vcs::GitCli;
use releasekit_workspaces::backend_for;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Loaded configuration plus the repository it applies to.
#[derive(Debug, Clone)]
pub struct Context {
    /// Parsed configuration.
    pub config: ReleaseConfig,
    /// Directory containing the configuration file.
    pub repo_root: PathBuf,
}

impl Context {
    /// Load `config_path`; its directory is the repository root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file is missing or invalid.
    pub fn load(config_path: &Path) -> Result<Self, CliError> {
        if !config_path.is_file() {
            return Err(CliError::config_with_help(
                format!("No configuration file at {}", config_path.display()),
                "Create a releasekit.toml at the repository root or pass --config",
            ));
        }
        let config = ReleaseConfig::load(config_path)?;
        let repo_root = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().map_err(releasekit_release::Error::from)?,
        };
        debug!(root = %repo_root.display(), "Loaded configuration");
        Ok(Self { config, repo_root })
    }

    /// Apply `--concurrency` and `--max-retries`.
    pub fn apply_overrides(&mut self, common: &CommonArgs) {
        if let Some(concurrency) = common.concurrency {
            self.config.publish.concurrency = concurrency;
        }
        if let Some(retries) = common.max_retries {
            self.config.publish.max_retries = retries;
        }
    }

    /// Workspace labels selected by `--workspace`, or all of them.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label.
    pub fn labels(&self, common: &CommonArgs) -> Result<Vec<String>, CliError> {
        if common.workspace.is_empty() {
            return Ok(self.config.workspace.keys().cloned().collect());
        }
        for label in &common.workspace {
            self.config.workspace(label)?;
        }
        Ok(common.workspace.clone())
    }

    /// The forge configured for the repository.
    #[must_use]
    pub fn forge(&self) -> Arc<dyn Forge> {
        let repo = self.config.repo_owner.as_ref().zip(self.config.repo_name.as_ref());
        match self.config.forge {
            ForgeKind::Github => {
                let forge = GhForge::new(&self.repo_root);
                Arc::new(match repo {
                    Some((owner, name)) => forge.with_repo(owner, name),
                    None => forge,
                })
            }
            ForgeKind::Gitlab => {
                let forge = GlabForge::new(&self.repo_root);
                Arc::new(match repo {
                    Some((owner, name)) => forge.with_repo(owner, name),
                    None => forge,
                })
            }
            ForgeKind::None => Arc::new(NoForge),
        }
    }

    /// Real backends for workspace `label`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label, ecosystem or tool.
    pub fn backends(&self, label: &str) -> Result<Backends, CliError> {
        let ws = self.config.workspace(label)?;
        let ecosystem = ws.ecosystem()?;
        Ok(Backends {
            workspace: Arc::from(backend_for(ecosystem)),
            vcs: Arc::new(GitCli::new(&self.repo_root)),
            forge: self.forge(),
            registry: registry_for(ecosystem, ws.registry_url.as_deref()),
            package_manager: package_manager_for(ecosystem, ws.tool.as_deref())?,
        })
    }

    /// Orchestrator settings for `label` with the command-line flags applied.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label.
    pub fn orchestrator_config(
        &self,
        label: &str,
        common: &CommonArgs,
    ) -> Result<OrchestratorConfig, CliError> {
        Ok(OrchestratorConfig::new(&self.config, label, &self.repo_root)?
            .with_groups(common.group.clone())
            .with_forced_bump(common.bump_type)
            .with_prerelease(common.prerelease.clone())
            .with_dry_run(common.dry_run)
            .with_force(common.force))
    }

    /// An orchestrator for `label` over real backends.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from [`Self::backends`] and
    /// [`Self::orchestrator_config`].
    pub fn orchestrator(
        &self,
        label: &str,
        common: &CommonArgs,
    ) -> Result<ReleaseOrchestrator, CliError> {
        Ok(ReleaseOrchestrator::new(
            self.orchestrator_config(label, common)?,
            self.backends(label)?,
        ))
    }

    /// Fail early when the forge CLI is missing or logged out.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the forge.
    pub async fn check_forge(&self) -> Result<(), CliError> {
        if self.config.forge == ForgeKind::None {
            return Ok(());
        }
        let forge = self.forge();
        if forge.is_available().await {
            Ok(())
        } else {
            Err(CliError::config_with_help(
                format!("The {} CLI is not installed or not authenticated", forge.name()),
                "Install gh or glab and run `auth login`, or export GH_TOKEN / GITLAB_TOKEN",
            ))
        }
    }

    /// Warn when `publish_from = "ci"` but this does not look like CI.
    pub fn check_publish_origin(&self) {
        if self.config.publish_from == PublishFrom::Ci && std::env::var_os("CI").is_none() {
            warn!("publish_from is \"ci\" but CI is not set; registry tokens may be missing");
        }
    }
}
