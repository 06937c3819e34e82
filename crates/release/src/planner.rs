//! Release planning.
//!
//! [`plan`] is a pure function of the dependency graph, the direct bumps
//! derived from commits and changesets, and [`PlanOptions`]. It performs no
//! I/O, which keeps every planning rule testable in isolation.

use crate::changeset::BumpType;
use crate::config::TagFormat;
use crate::error::{Error, Result};
use crate::version::{PropagationPolicy, VersioningScheme};
use chrono::NaiveDate;
use releasekit_graph::PackageGraph;
use releasekit_workspaces::{Ecosystem, Package};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use tracing::debug;

/// Evidence for one package's own bump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectBump {
    /// Net bump from commits and changesets.
    pub bump: BumpType,
    /// Contributing commits as `<short sha> <header>`.
    pub commits: Vec<String>,
    /// Contributing changeset ids.
    pub changesets: Vec<String>,
}

/// Why a package is in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanReason {
    /// Its own commits.
    Commits,
    /// A changeset names it.
    Changeset,
    /// Only a dependency changed.
    Dependency,
    /// `--bump-type` was given.
    Forced,
}

impl std::fmt::Display for PlanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Commits => "commits",
            Self::Changeset => "changeset",
            Self::Dependency => "dependency",
            Self::Forced => "forced",
        })
    }
}

/// Planning knobs.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Bump every package by this much regardless of history.
    pub forced_bump: Option<BumpType>,
    /// Prerelease label for every new version.
    pub prerelease: Option<String>,
    /// How bumps reach dependents.
    pub propagation: PropagationPolicy,
    /// Scheme for packages without an entry in `schemes`.
    pub default_scheme: VersioningScheme,
    /// Per-package scheme overrides.
    pub schemes: BTreeMap<String, VersioningScheme>,
    /// Tag format for packages without an entry in `tag_formats`.
    pub default_tag_format: TagFormat,
    /// Per-package tag format overrides.
    pub tag_formats: BTreeMap<String, TagFormat>,
    /// Packages never planned.
    pub skip: BTreeSet<String>,
    /// Umbrella tag format.
    pub umbrella_tag: Option<TagFormat>,
    /// Date used by CalVer.
    pub today: NaiveDate,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            forced_bump: None,
            prerelease: None,
            propagation: PropagationPolicy::default(),
            default_scheme: VersioningScheme::default(),
            schemes: BTreeMap::new(),
            default_tag_format: TagFormat::default(),
            tag_formats: BTreeMap::new(),
            skip: BTreeSet::new(),
            umbrella_tag: None,
            today: chrono::Utc::now().date_naive(),
        }
    }
}

impl PlanOptions {
    /// Scheme for `package`.
    #[must_use]
    pub fn scheme_for(&self, package: &str) -> &VersioningScheme {
        self.schemes.get(package).unwrap_or(&self.default_scheme)
    }

    /// Tag format for `package`.
    #[must_use]
    pub fn tag_format_for(&self, package: &str) -> &TagFormat {
        self.tag_formats
            .get(package)
            .unwrap_or(&self.default_tag_format)
    }
}

/// One planned version change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlanEntry {
    /// Package name.
    pub package: String,
    /// Ecosystem.
    pub ecosystem: Ecosystem,
    /// Version in the manifest now.
    pub current_version: String,
    /// Version to release; strictly greater than `current_version`.
    pub new_version: String,
    /// Effective bump.
    pub bump: BumpType,
    /// Why the package is included.
    pub reason: PlanReason,
    /// Tag for `new_version`.
    pub tag: String,
    /// Commits that caused the bump.
    pub contributing_commits: Vec<String>,
    /// Changesets that caused the bump.
    pub contributing_changesets: Vec<String>,
}

/// A complete release plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    /// Entries in publish order.
    pub entries: Vec<ReleasePlanEntry>,
    /// Entry names per publish level.
    pub levels: Vec<Vec<String>>,
    /// Umbrella tag, when configured and the plan is not empty.
    pub umbrella_tag: Option<String>,
}

impl ReleasePlan {
    /// Whether nothing is to be released.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `package`.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&ReleasePlanEntry> {
        self.entries.iter().find(|e| e.package == package)
    }

    /// Package name to new version.
    #[must_use]
    pub fn new_versions(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.package.clone(), e.new_version.clone()))
            .collect()
    }

    /// Every tag the plan creates, umbrella last.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.tag.clone())
            .chain(self.umbrella_tag.clone())
            .collect()
    }

    /// Pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text table, one row per entry.
    #[must_use]
    pub fn render_table(&self) -> String {
        if self.entries.is_empty() {
            return "Nothing to release.\n".to_string();
        }
        let width = self
            .entries
            .iter()
            .map(|e| e.package.len())
            .max()
            .unwrap_or(0)
            .max("PACKAGE".len());
        let mut out = format!(
            "{:<width$}  {:<12}  {:<12}  {:<6}  REASON\n",
            "PACKAGE", "CURRENT", "NEW", "BUMP"
        );
        for e in &self.entries {
            let reason = serde_json::to_value(e.reason)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{:<width$}  {:<12}  {:<12}  {:<6}  {reason}",
                e.package, e.current_version, e.new_version, e.bump.to_string()
            );
        }
        if let Some(umbrella) = &self.umbrella_tag {
            let _ = writeln!(out, "\numbrella tag: {umbrella}");
        }
        out
    }
}

/// Compute a release plan.
///
/// # Errors
///
/// Returns a graph error for dependency cycles, a version error when a
/// current version does not parse, and [`Error::VersionNotIncreasing`] when a
/// computed version would not move forward.
pub fn plan(
    graph: &PackageGraph<Package>,
    direct: &BTreeMap<String, DirectBump>,
    options: &PlanOptions,
) -> Result<ReleasePlan> {
    let levels = graph.publish_levels()?;

    let seeds: HashMap<String, BumpType> = graph
        .iter_nodes()
        .filter(|node| !options.skip.contains(&node.name))
        .filter_map(|node| {
            let bump = options
                .forced_bump
                .unwrap_or_else(|| direct.get(&node.name).map(|d| d.bump).unwrap_or_default());
            bump.is_some().then(|| (node.name.clone(), bump))
        })
        .collect();
    let policy = options.propagation;
    let bumps = graph.propagate(&seeds, |b| policy.cap(b));

    let mut entries = Vec::new();
    let mut planned_levels = Vec::new();
    for level in &levels {
        let mut names = Vec::new();
        for name in level {
            let Some(&bump) = bumps.get(name) else {
                continue;
            };
            if !bump.is_some() || options.skip.contains(name) {
                continue;
            }
            let Some(node) = graph.get(name) else {
                continue;
            };
            if let Some(entry) = plan_entry(&node.package, bump, direct.get(name), options)? {
                names.push(entry.package.clone());
                entries.push(entry);
            }
        }
        if !names.is_empty() {
            planned_levels.push(names);
        }
    }

    let umbrella_tag = options.umbrella_tag.as_ref().and_then(|format| {
        highest_version(entries.iter().map(|e| e.new_version.as_str()), &options.default_scheme)
            .map(|v| format.render("", &v))
    });

    debug!(entries = entries.len(), levels = planned_levels.len(), "Computed release plan");
    Ok(ReleasePlan {
        entries,
        levels: planned_levels,
        umbrella_tag,
    })
}

fn plan_entry(
    package: &Package,
    bump: BumpType,
    direct: Option<&DirectBump>,
    options: &PlanOptions,
) -> Result<Option<ReleasePlanEntry>> {
    let scheme = options.scheme_for(&package.name);
    let prerelease = options.prerelease.as_deref();
    let Some(new_version) =
        scheme.next_version_on(&package.version, bump, prerelease, options.today)?
    else {
        return Ok(None);
    };
    if scheme.compare(&new_version, &package.version)? != Ordering::Greater {
        return Err(Error::VersionNotIncreasing {
            package: package.name.clone(),
            current: package.version.clone(),
            new: new_version,
        });
    }

    let own = direct.map(|d| d.bump).unwrap_or_default();
    let reason = if options.forced_bump.is_some() {
        PlanReason::Forced
    } else if own < bump || own == BumpType::None {
        PlanReason::Dependency
    } else if direct.is_some_and(|d| d.commits.is_empty() && !d.changesets.is_empty()) {
        PlanReason::Changeset
    } else {
        PlanReason::Commits
    };

    let contributes = reason != PlanReason::Dependency;
    Ok(Some(ReleasePlanEntry {
        package: package.name.clone(),
        ecosystem: package.ecosystem,
        current_version: package.version.clone(),
        tag: options
            .tag_format_for(&package.name)
            .render(&package.name, &new_version),
        new_version,
        bump,
        reason,
        contributing_commits: direct
            .filter(|_| contributes)
            .map(|d| d.commits.clone())
            .unwrap_or_default(),
        contributing_changesets: direct
            .filter(|_| contributes)
            .map(|d| d.changesets.clone())
            .unwrap_or_default(),
    }))
}

/// Highest of `versions` under `scheme`; unparsable versions compare as
/// strings.
pub fn highest_version<'a>(
    versions: impl IntoIterator<Item = &'a str>,
    scheme: &VersioningScheme,
) -> Option<String> {
    versions
        .into_iter()
        .max_by(|a, b| scheme.compare(a, b).unwrap_or_else(|_| a.cmp(b)))
        .map(str::to_string)
}
