//! `releasekit.toml` configuration.
//!
//! The file is deserialized with every field defaulted, then validated as a
//! whole so that a bad value fails the run before anything is mutated.

use crate::conventional::{CommitParser, OpenParser, StrictParser};
use crate::error::{Error, Result};
use crate::version::{CalverFormat, PropagationPolicy, VersioningScheme, DEFAULT_CALVER_FORMAT};
use regex::Regex;
use releasekit_workspaces::Ecosystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "releasekit.toml";

/// Default per-package tag format.
pub const DEFAULT_TAG_FORMAT: &str = "{name}-v{version}";

/// Default umbrella tag format.
pub const DEFAULT_UMBRELLA_TAG: &str = "v{version}";

/// Which forge hosts the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    /// GitHub, driven through the `gh` CLI.
    Github,
    /// GitLab, driven through the `glab` CLI.
    Gitlab,
    /// No forge integration; forge calls are skipped.
    #[default]
    None,
}

/// Where publishing runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishFrom {
    /// From a developer machine.
    #[default]
    Local,
    /// From CI, where registry tokens come from the environment.
    Ci,
}

/// Top-level `releasekit.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Forge hosting the repository.
    pub forge: ForgeKind,
    /// Repository owner or group.
    pub repo_owner: Option<String>,
    /// Repository name.
    pub repo_name: Option<String>,
    /// Branch release PRs target.
    pub default_branch: String,
    /// Where publishing runs.
    pub publish_from: PublishFrom,
    /// Changeset directory, relative to the repository root.
    pub changeset_dir: String,
    /// Release manifest artifact path, relative to the repository root.
    pub manifest_path: String,
    /// Publish pipeline settings.
    pub publish: PublishSettings,
    /// Workspaces keyed by label.
    pub workspace: BTreeMap<String, WorkspaceConfig>,
    /// Announcement targets. Accepted and ignored.
    pub announce: Option<toml::Value>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            forge: ForgeKind::default(),
            repo_owner: None,
            repo_name: None,
            default_branch: "main".to_string(),
            publish_from: PublishFrom::default(),
            changeset_dir: crate::changeset::DEFAULT_CHANGESET_DIR.to_string(),
            manifest_path: "dist/release-manifest.json".to_string(),
            publish: PublishSettings::default(),
            workspace: BTreeMap::new(),
            announce: None,
        }
    }
}

/// `[publish]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Packages published concurrently within a level; 0 sizes automatically.
    pub concurrency: usize,
    /// Publish retries after the first attempt.
    pub max_retries: u32,
    /// Base retry delay.
    pub retry_base_delay_ms: u64,
    /// Retry delay cap.
    pub retry_max_delay_ms: u64,
    /// Build timeout.
    pub build_timeout_secs: u64,
    /// Publish timeout per attempt.
    pub publish_timeout_secs: u64,
    /// How long to wait for the registry to list a new version.
    pub poll_timeout_secs: u64,
    /// Delay between registry polls.
    pub poll_interval_secs: u64,
    /// Run the package manager's smoke test after polling.
    pub smoke_test: bool,
    /// Create forge releases for new tags.
    pub create_releases: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            concurrency: 0,
            max_retries: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 60_000,
            build_timeout_secs: 600,
            publish_timeout_secs: 300,
            poll_timeout_secs: 300,
            poll_interval_secs: 5,
            smoke_test: false,
            create_releases: true,
        }
    }
}

/// `[workspace.<label>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Ecosystem name (`rust`, `javascript`, `python`, `go`, `dart`).
    pub ecosystem: String,
    /// Package manager override (`pnpm`, `npm`, ...).
    pub tool: Option<String>,
    /// Workspace root relative to the repository root.
    pub root: String,
    /// Per-package tag format with `{name}` and `{version}` placeholders.
    pub tag_format: String,
    /// Umbrella tag format, created once per release when set.
    pub umbrella_tag: Option<String>,
    /// Package name patterns to ignore entirely.
    pub exclude: Vec<String>,
    /// Package name patterns that are versioned but never published.
    pub exclude_publish: Vec<String>,
    /// `semver`, `pep440` or `calver`. Defaults to `pep440` for Python.
    pub versioning_scheme: Option<String>,
    /// CalVer format.
    pub calver_format: String,
    /// `strict` or `open`.
    pub commit_parser: String,
    /// Commit types accepted by the strict parser.
    pub allowed_types: Option<Vec<String>>,
    /// Apply major bumps on `0.x` versions as major.
    pub major_on_zero: bool,
    /// How upstream bumps reach dependents.
    pub propagation: PropagationPolicy,
    /// Named package groups (group name to name patterns).
    pub groups: BTreeMap<String, Vec<String>>,
    /// Per-package overrides.
    pub packages: BTreeMap<String, PackageOverride>,
    /// Registry base URL override.
    pub registry_url: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            ecosystem: String::new(),
            tool: None,
            root: ".".to_string(),
            tag_format: DEFAULT_TAG_FORMAT.to_string(),
            umbrella_tag: None,
            exclude: Vec::new(),
            exclude_publish: Vec::new(),
            versioning_scheme: None,
            calver_format: DEFAULT_CALVER_FORMAT.to_string(),
            commit_parser: "strict".to_string(),
            allowed_types: None,
            major_on_zero: false,
            propagation: PropagationPolicy::default(),
            groups: BTreeMap::new(),
            packages: BTreeMap::new(),
            registry_url: None,
        }
    }
}

/// `[workspace.<label>.packages.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOverride {
    /// Scheme override.
    pub versioning_scheme: Option<String>,
    /// CalVer format override.
    pub calver_format: Option<String>,
    /// Tag format override.
    pub tag_format: Option<String>,
    /// Leave this package out of every plan.
    pub skip: bool,
}

impl ReleaseConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is missing, malformed or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("cannot read {}: {e}", path.display()),
                format!("Create a {CONFIG_FILE} or pass --config"),
            )
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            workspaces = config.workspace.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or invalid values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            Error::config(
                format!("invalid {CONFIG_FILE}: {}", e.message()),
                "Check the file against the documented keys",
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every workspace.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        if self.workspace.is_empty() {
            return Err(Error::config(
                "no workspaces configured",
                "Add at least one [workspace.<label>] table",
            ));
        }
        if self.publish.poll_interval_secs == 0 {
            return Err(Error::config(
                "publish.poll_interval_secs must be positive",
                "Use a poll interval of at least one second",
            ));
        }
        for (label, workspace) in &self.workspace {
            workspace.validate(label)?;
        }
        Ok(())
    }

    /// Look up a workspace by label.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label.
    pub fn workspace(&self, label: &str) -> Result<&WorkspaceConfig> {
        self.workspace.get(label).ok_or_else(|| {
            Error::config(
                format!("unknown workspace '{label}'"),
                format!(
                    "Configured workspaces: {}",
                    self.workspace.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }

    /// Resolve the manifest artifact path against `repo_root`.
    #[must_use]
    pub fn manifest_file(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.manifest_path)
    }
}

impl WorkspaceConfig {
    fn validate(&self, label: &str) -> Result<()> {
        let context = |e: Error| match e {
            Error::Config { message, help } => {
                Error::config(format!("workspace '{label}': {message}"), help)
            }
            other => other,
        };
        self.ecosystem().map_err(context)?;
        self.default_scheme().map_err(context)?;
        self.parser().map_err(context)?;
        TagFormat::new(&self.tag_format).map_err(context)?;
        if let Some(umbrella) = &self.umbrella_tag {
            TagFormat::new(umbrella).map_err(context)?;
        }
        for (name, over) in &self.packages {
            self.scheme_for(name).map_err(context)?;
            if let Some(format) = &over.tag_format {
                TagFormat::new(format).map_err(context)?;
            }
        }
        Ok(())
    }

    /// The workspace's ecosystem.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown ecosystem.
    pub fn ecosystem(&self) -> Result<Ecosystem> {
        self.ecosystem.parse().map_err(|_| {
            Error::config(
                format!("unknown ecosystem '{}'", self.ecosystem),
                format!(
                    "Use one of {}",
                    Ecosystem::ALL.map(Ecosystem::as_str).join(", ")
                ),
            )
        })
    }

    /// Versioning scheme for packages without an override.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown scheme or CalVer format.
    pub fn default_scheme(&self) -> Result<VersioningScheme> {
        let name = match &self.versioning_scheme {
            Some(name) => name.clone(),
            None if self.ecosystem().ok() == Some(Ecosystem::Python) => "pep440".to_string(),
            None => "semver".to_string(),
        };
        self.build_scheme(&name, &self.calver_format)
    }

    /// Versioning scheme for `package`, honoring overrides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown scheme or CalVer format.
    pub fn scheme_for(&self, package: &str) -> Result<VersioningScheme> {
        match self.packages.get(package) {
            Some(over) if over.versioning_scheme.is_some() || over.calver_format.is_some() => {
                let format = over.calver_format.as_deref().unwrap_or(&self.calver_format);
                match &over.versioning_scheme {
                    Some(name) => self.build_scheme(name, format),
                    None => match self.default_scheme()? {
                        VersioningScheme::Calver(_) => self.build_scheme("calver", format),
                        other => Ok(other),
                    },
                }
            }
            _ => self.default_scheme(),
        }
    }

    fn build_scheme(&self, name: &str, calver_format: &str) -> Result<VersioningScheme> {
        match name.to_ascii_lowercase().as_str() {
            "semver" => Ok(VersioningScheme::Semver {
                major_on_zero: self.major_on_zero,
            }),
            "pep440" => Ok(VersioningScheme::Pep440 {
                major_on_zero: self.major_on_zero,
            }),
            "calver" => Ok(VersioningScheme::Calver(CalverFormat::new(calver_format)?)),
            other => Err(Error::config(
                format!("unknown versioning scheme '{other}'"),
                "Use semver, pep440 or calver",
            )),
        }
    }

    /// Tag format for `package`, honoring overrides.
    #[must_use]
    pub fn tag_format_for(&self, package: &str) -> TagFormat {
        let format = self
            .packages
            .get(package)
            .and_then(|o| o.tag_format.clone())
            .unwrap_or_else(|| self.tag_format.clone());
        TagFormat(format)
    }

    /// Umbrella tag format, if configured.
    #[must_use]
    pub fn umbrella_format(&self) -> Option<TagFormat> {
        self.umbrella_tag.clone().map(TagFormat)
    }

    /// Whether `package` is skipped by an override.
    #[must_use]
    pub fn is_skipped(&self, package: &str) -> bool {
        self.packages.get(package).is_some_and(|o| o.skip)
    }

    /// The configured commit parser.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown parser name.
    pub fn parser(&self) -> Result<Box<dyn CommitParser>> {
        match self.commit_parser.to_ascii_lowercase().as_str() {
            "strict" => Ok(match &self.allowed_types {
                Some(types) => Box::new(StrictParser::new(types)),
                None => Box::new(StrictParser::default()),
            }),
            "open" => Ok(Box::new(OpenParser)),
            other => Err(Error::config(
                format!("unknown commit parser '{other}'"),
                "Use strict or open",
            )),
        }
    }
}

/// A tag format with `{name}` and `{version}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFormat(pub String);

impl Default for TagFormat {
    fn default() -> Self {
        Self(DEFAULT_TAG_FORMAT.to_string())
    }
}

impl TagFormat {
    /// Validate and wrap a format.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `{version}` is missing.
    pub fn new(format: &str) -> Result<Self> {
        if !format.contains("{version}") {
            return Err(Error::config(
                format!("tag format '{format}' has no {{version}} placeholder"),
                "Tag formats look like {name}-v{version} or v{version}",
            ));
        }
        Ok(Self(format.to_string()))
    }

    /// Render a tag.
    #[must_use]
    pub fn render(&self, name: &str, version: &str) -> String {
        self.0.replace("{name}", name).replace("{version}", version)
    }

    /// Recover `(name, version)` from a tag. The name is `None` when the
    /// format has no `{name}` placeholder.
    #[must_use]
    pub fn parse(&self, tag: &str) -> Option<(Option<String>, String)> {
        let mut pattern = String::from("^");
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find('{') {
            pattern.push_str(&regex::escape(&rest[..start]));
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{name}") {
                pattern.push_str("(?P<name>.+?)");
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{version}") {
                pattern.push_str(r"(?P<version>[0-9].*)");
                rest = after;
            } else {
                pattern.push_str(r"\{");
                rest = &tail[1..];
            }
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        let caps = Regex::new(&pattern).ok()?.captures(tag)?;
        let version = caps.name("version")?.as_str().to_string();
        Some((caps.name("name").map(|m| m.as_str().to_string()), version))
    }
}

impl std::fmt::Display for TagFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
forge = "github"
repo_owner = "acme"
repo_name = "mono"

[publish]
concurrency = 4
max_retries = 2

[workspace.py]
ecosystem = "python"
root = "py"
umbrella_tag = "py/v{version}"
exclude = ["samples-*"]
groups = { core = ["genkit", "genkit-plugin-*"] }

[workspace.py.packages.genkit]
tag_format = "genkit-v{version}"

[workspace.py.packages.legacy]
skip = true

[workspace.rs]
ecosystem = "rust"
commit_parser = "open"

[announce.slack]
webhook = "https://example.invalid"
"#;

    #[test]
    fn test_load_sample() {
        let config = ReleaseConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.forge, ForgeKind::Github);
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.publish.concurrency, 4);
        assert_eq!(config.publish.poll_interval_secs, 5);

        let py = config.workspace("py").unwrap();
        assert_eq!(py.ecosystem().unwrap(), Ecosystem::Python);
        assert_eq!(
            py.default_scheme().unwrap(),
            VersioningScheme::Pep440 { major_on_zero: false }
        );
        assert_eq!(py.tag_format_for("genkit").render("genkit", "1.0.0"), "genkit-v1.0.0");
        assert_eq!(py.tag_format_for("other").render("other", "1.0.0"), "other-v1.0.0");
        assert!(py.is_skipped("legacy"));
        assert!(!py.is_skipped("genkit"));

        let rs = config.workspace("rs").unwrap();
        assert_eq!(rs.default_scheme().unwrap(), VersioningScheme::default());
        assert!(rs.parser().unwrap().accepts_type("wip"));
        assert!(config.workspace("go").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let err = ReleaseConfig::from_toml("forge = \"github\"").unwrap_err();
        assert!(err.to_string().contains("no workspaces"));

        let err = ReleaseConfig::from_toml("[workspace.x]\necosystem = \"cobol\"").unwrap_err();
        assert!(err.to_string().contains("unknown ecosystem 'cobol'"));

        let err = ReleaseConfig::from_toml(
            "[workspace.x]\necosystem = \"rust\"\nversioning_scheme = \"roman\"",
        )
        .unwrap_err();
        assert!(err.to_string().contains("roman"));

        let err = ReleaseConfig::from_toml(
            "[workspace.x]\necosystem = \"rust\"\ntag_format = \"{name}\"",
        )
        .unwrap_err();
        assert!(err.to_string().contains("{version}"));

        let err = ReleaseConfig::from_toml("forge = \"bitbucket\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_scheme_override() {
        let config = ReleaseConfig::from_toml(
            r#"
[workspace.x]
ecosystem = "rust"
[workspace.x.packages.dated]
versioning_scheme = "calver"
calver_format = "YYYY.0M.MICRO"
"#,
        )
        .unwrap();
        let ws = config.workspace("x").unwrap();
        assert_eq!(ws.scheme_for("dated").unwrap().name(), "calver");
        assert_eq!(ws.scheme_for("plain").unwrap().name(), "semver");
    }

    #[test]
    fn test_tag_format_parse() {
        let format = TagFormat::default();
        assert_eq!(
            format.parse("genkit-plugin-v1.2.0"),
            Some((Some("genkit-plugin".to_string()), "1.2.0".to_string()))
        );
        let umbrella = TagFormat::new("py/v{version}").unwrap();
        assert_eq!(umbrella.parse("py/v2.0.0"), Some((None, "2.0.0".to_string())));
        assert_eq!(umbrella.parse("v2.0.0"), None);
    }
}
