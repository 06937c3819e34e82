//! Group assignment and exclusion filtering over discovered packages.

use crate::error::{Error, Result};
use crate::package::Package;
use glob::Pattern;
use std::collections::BTreeMap;
use tracing::debug;

/// Compiled name patterns.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    patterns: Vec<Pattern>,
}

impl NameMatcher {
    /// Compile a list of glob patterns over package names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an invalid glob.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches `name`.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// Selects the packages a run operates on.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    groups: BTreeMap<String, NameMatcher>,
    exclude: NameMatcher,
    exclude_publish: NameMatcher,
}

impl PackageFilter {
    /// Build a filter from group definitions (group name to name patterns),
    /// exclusion patterns, and patterns for packages that are released but
    /// never published.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an invalid glob.
    pub fn new(
        groups: &BTreeMap<String, Vec<String>>,
        exclude: &[String],
        exclude_publish: &[String],
    ) -> Result<Self> {
        let groups = groups
            .iter()
            .map(|(name, patterns)| Ok((name.clone(), NameMatcher::new(patterns)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            groups,
            exclude: NameMatcher::new(exclude)?,
            exclude_publish: NameMatcher::new(exclude_publish)?,
        })
    }

    /// Tag packages with their groups, drop excluded packages, then keep only
    /// members of `selected` groups (all packages when `selected` is empty).
    ///
    /// Dependencies on dropped packages are removed so the result forms a
    /// closed graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGroup`] if a selected group is not declared.
    pub fn apply(&self, packages: Vec<Package>, selected: &[String]) -> Result<Vec<Package>> {
        for group in selected {
            if !self.groups.contains_key(group) {
                return Err(Error::UnknownGroup {
                    group: group.clone(),
                });
            }
        }

        let mut kept: Vec<Package> = packages
            .into_iter()
            .filter(|p| {
                let excluded = self.exclude.matches(&p.name);
                if excluded {
                    debug!(package = %p.name, "Excluded by pattern");
                }
                !excluded
            })
            .map(|mut p| {
                for (group, matcher) in &self.groups {
                    if matcher.matches(&p.name) {
                        p.groups.insert(group.clone());
                    }
                }
                if self.exclude_publish.matches(&p.name) {
                    p.publishable = false;
                }
                p
            })
            .filter(|p| selected.is_empty() || selected.iter().any(|g| p.groups.contains(g)))
            .collect();

        let names: Vec<String> = kept.iter().map(|p| p.name.clone()).collect();
        for package in &mut kept {
            package.dependencies.retain(|d| names.contains(d));
        }
        Ok(kept)
    }
}
