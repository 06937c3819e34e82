//! Version engine: next-version computation and ordering per scheme.
//!
//! Three schemes are supported. SemVer is backed by the `semver` crate;
//! PEP 440 and CalVer are parsed here since only the subset releasekit
//! emits needs to round-trip.

use crate::changeset::BumpType;
use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Default CalVer format.
pub const DEFAULT_CALVER_FORMAT: &str = "YYYY.MM.MICRO";

/// How a bump on an upstream package reaches its dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationPolicy {
    /// Dependents always receive at most a patch bump.
    #[default]
    Patch,
    /// Breaking upstream changes propagate as major; everything else as patch.
    Match,
}

impl PropagationPolicy {
    /// The bump a dependent receives for an upstream `bump`.
    #[must_use]
    pub fn cap(self, bump: BumpType) -> BumpType {
        match (self, bump) {
            (Self::Match, BumpType::Major) => BumpType::Major,
            _ => bump.min(BumpType::Patch),
        }
    }
}

/// A versioning scheme with its policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersioningScheme {
    /// Semantic Versioning 2.0.
    Semver {
        /// When false, a major bump on `0.x` is applied as a minor bump.
        major_on_zero: bool,
    },
    /// Python PEP 440 (release, pre, post and dev segments; no epochs).
    Pep440 {
        /// When false, a major bump on `0.x` is applied as a minor bump.
        major_on_zero: bool,
    },
    /// Calendar versioning.
    Calver(CalverFormat),
}

impl Default for VersioningScheme {
    fn default() -> Self {
        Self::Semver {
            major_on_zero: false,
        }
    }
}

impl VersioningScheme {
    /// Short scheme name used in errors and output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Semver { .. } => "semver",
            Self::Pep440 { .. } => "pep440",
            Self::Calver(_) => "calver",
        }
    }

    /// Compute the next version against today's date (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error if `current` does not parse under this scheme or the
    /// prerelease label is not supported.
    pub fn next_version(
        &self,
        current: &str,
        bump: BumpType,
        prerelease: Option<&str>,
    ) -> Result<Option<String>> {
        self.next_version_on(current, bump, prerelease, Utc::now().date_naive())
    }

    /// Compute the next version with an explicit clock.
    ///
    /// Returns `None` for a `none` bump.
    ///
    /// # Errors
    ///
    /// Returns an error if `current` does not parse under this scheme or the
    /// prerelease label is not supported.
    pub fn next_version_on(
        &self,
        current: &str,
        bump: BumpType,
        prerelease: Option<&str>,
        today: NaiveDate,
    ) -> Result<Option<String>> {
        if !bump.is_some() {
            return Ok(None);
        }
        let prerelease = prerelease.map(str::trim).filter(|l| !l.is_empty());
        let next = match self {
            Self::Semver { major_on_zero } => {
                next_semver(current, bump, *major_on_zero, prerelease)?
            }
            Self::Pep440 { major_on_zero } => {
                next_pep440(current, bump, *major_on_zero, prerelease)?
            }
            Self::Calver(format) => {
                if let Some(label) = prerelease {
                    return Err(Error::config(
                        format!("prerelease label '{label}' cannot be used with calver"),
                        "Drop --prerelease or switch the workspace to semver or pep440",
                    ));
                }
                format.next(current, today)?
            }
        };
        Ok(Some(next))
    }

    /// Order two versions under this scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if either version does not parse.
    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        match self {
            Self::Semver { .. } => Ok(parse_semver(a)?.cmp(&parse_semver(b)?)),
            Self::Pep440 { .. } => Ok(Pep440Version::parse(a)?.cmp(&Pep440Version::parse(b)?)),
            Self::Calver(format) => Ok(format.parse(a)?.cmp(&format.parse(b)?)),
        }
    }

    /// Check that `version` parses under this scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] when it does not.
    pub fn validate(&self, version: &str) -> Result<()> {
        match self {
            Self::Semver { .. } => parse_semver(version).map(|_| ()),
            Self::Pep440 { .. } => Pep440Version::parse(version).map(|_| ()),
            Self::Calver(format) => format.parse(version).map(|_| ()),
        }
    }
}

/// Compute the next version of `current` under `scheme`.
///
/// # Errors
///
/// See [`VersioningScheme::next_version`].
pub fn next_version(
    current: &str,
    bump: BumpType,
    scheme: &VersioningScheme,
    prerelease: Option<&str>,
) -> Result<Option<String>> {
    scheme.next_version(current, bump, prerelease)
}

fn effective_bump(major: u64, bump: BumpType, major_on_zero: bool) -> BumpType {
    if major == 0 && bump == BumpType::Major && !major_on_zero {
        BumpType::Minor
    } else {
        bump
    }
}

/// The bump a prerelease base already implies relative to its predecessor.
fn implied_bump(major: u64, minor: u64, patch: u64) -> BumpType {
    if patch != 0 {
        BumpType::Patch
    } else if minor != 0 || major == 0 {
        BumpType::Minor
    } else {
        BumpType::Major
    }
}

/// Bump a release triple. Overflowing a component is an invalid version of
/// `current` under `scheme`.
fn apply_bump(
    (major, minor, patch): (u64, u64, u64),
    bump: BumpType,
    current: &str,
    scheme: &str,
) -> Result<(u64, u64, u64)> {
    let bumped = match bump {
        BumpType::Major => major.checked_add(1).map(|m| (m, 0, 0)),
        BumpType::Minor => minor.checked_add(1).map(|m| (major, m, 0)),
        BumpType::Patch => patch.checked_add(1).map(|p| (major, minor, p)),
        BumpType::None => Some((major, minor, patch)),
    };
    bumped.ok_or_else(|| Error::invalid_version(current, scheme))
}

// SemVer

fn parse_semver(version: &str) -> Result<semver::Version> {
    let trimmed = version.trim();
    semver::Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed))
        .map_err(|_| Error::invalid_version(version, "semver"))
}

fn prerelease_counter(pre: &str, label: &str) -> Option<u64> {
    if pre == label {
        return Some(0);
    }
    pre.strip_prefix(label)?
        .strip_prefix('.')?
        .parse()
        .ok()
}

fn next_semver(
    current: &str,
    bump: BumpType,
    major_on_zero: bool,
    label: Option<&str>,
) -> Result<String> {
    let cur = parse_semver(current)?;
    let bump = effective_bump(cur.major, bump, major_on_zero);
    let triple = (cur.major, cur.minor, cur.patch);

    let base = if cur.pre.is_empty() || bump > implied_bump(cur.major, cur.minor, cur.patch) {
        apply_bump(triple, bump, current, "semver")?
    } else {
        triple
    };

    let build = |base: (u64, u64, u64), counter: u64| -> Result<semver::Version> {
        let mut next = semver::Version::new(base.0, base.1, base.2);
        if let Some(label) = label {
            next.pre = semver::Prerelease::new(&format!("{label}.{counter}"))
                .map_err(|_| Error::invalid_version(format!("{label}.{counter}"), "semver"))?;
        }
        Ok(next)
    };

    let counter = label
        .filter(|_| base == triple && !cur.pre.is_empty())
        .and_then(|l| prerelease_counter(cur.pre.as_str(), l))
        .map_or(1, |n| n.saturating_add(1));
    let mut next = build(base, counter)?;
    if next <= cur {
        next = build(apply_bump(base, bump, current, "semver")?, 1)?;
    }
    Ok(next.to_string())
}

// PEP 440

static PEP440: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^v?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre>a|b|rc|c|alpha|beta|pre|preview)[-_.]?(?P<pre_n>[0-9]*))?
        (?:[-_.]?(?:post|rev|r)[-_.]?(?P<post>[0-9]*))?
        (?:[-_.]?dev[-_.]?(?P<dev>[0-9]*))?
        $",
    )
    .ok()
});

/// PEP 440 prerelease phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreKind {
    /// `aN`
    Alpha,
    /// `bN`
    Beta,
    /// `rcN`
    Rc,
}

impl PreKind {
    fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" | "c" | "pre" | "preview" => Some(Self::Rc),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// A parsed PEP 440 version without epoch or local segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pep440Version {
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

impl Pep440Version {
    /// Parse a PEP 440 version string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] for anything outside the supported
    /// subset.
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || Error::invalid_version(version, "pep440");
        let re = PEP440.as_ref().ok_or_else(invalid)?;
        let caps = re.captures(version.trim()).ok_or_else(invalid)?;

        let number = |name: &str| -> Result<Option<u64>> {
            caps.name(name)
                .map(|m| {
                    if m.as_str().is_empty() {
                        Ok(0)
                    } else {
                        m.as_str().parse().map_err(|_| invalid())
                    }
                })
                .transpose()
        };

        let release = caps
            .name("release")
            .ok_or_else(invalid)?
            .as_str()
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        let pre = match caps.name("pre") {
            Some(kind) => {
                let kind = PreKind::from_label(kind.as_str()).ok_or_else(invalid)?;
                Some((kind, number("pre_n")?.unwrap_or(0)))
            }
            None => None,
        };
        // `post` and `dev` groups only participate when their keyword matched.
        Ok(Self {
            release,
            pre,
            post: number("post")?,
            dev: number("dev")?,
        })
    }

    fn triple(&self) -> (u64, u64, u64) {
        let at = |i: usize| self.release.get(i).copied().unwrap_or(0);
        (at(0), at(1), at(2))
    }

    const fn is_prerelease(&self) -> bool {
        self.post.is_none() && (self.pre.is_some() || self.dev.is_some())
    }

    fn sort_key(&self) -> ((u64, u64, u64, Vec<u64>), (u8, u64), (u8, u64), (u8, u64)) {
        let (a, b, c) = self.triple();
        let tail = self.release.iter().skip(3).copied().collect();
        let pre = match self.pre {
            Some((kind, n)) => (kind as u8 + 1, n),
            None if self.post.is_none() && self.dev.is_some() => (0, 0),
            None => (4, 0),
        };
        let post = self.post.map_or((0, 0), |n| (1, n));
        let dev = self.dev.map_or((1, 0), |n| (0, n));
        ((a, b, c, tail), pre, post, dev)
    }
}

impl Ord for Pep440Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Pep440Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Pep440Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{n}", kind.as_str())?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        Ok(())
    }
}

enum Pep440Label {
    Pre(PreKind),
    Dev,
}

fn next_pep440(
    current: &str,
    bump: BumpType,
    major_on_zero: bool,
    label: Option<&str>,
) -> Result<String> {
    let cur = Pep440Version::parse(current)?;
    let label = label
        .map(|l| {
            if l.eq_ignore_ascii_case("dev") {
                Ok(Pep440Label::Dev)
            } else {
                PreKind::from_label(l).map(Pep440Label::Pre).ok_or_else(|| {
                    Error::config(
                        format!("unsupported PEP 440 prerelease label '{l}'"),
                        "Use one of a, alpha, b, beta, rc or dev",
                    )
                })
            }
        })
        .transpose()?;

    let triple = cur.triple();
    let bump = effective_bump(triple.0, bump, major_on_zero);
    let base = if !cur.is_prerelease() || bump > implied_bump(triple.0, triple.1, triple.2) {
        apply_bump(triple, bump, current, "pep440")?
    } else {
        triple
    };

    let build = |base: (u64, u64, u64), continue_series: bool| {
        let mut next = Pep440Version {
            release: vec![base.0, base.1, base.2],
            pre: None,
            post: None,
            dev: None,
        };
        match &label {
            None => {}
            Some(Pep440Label::Dev) => {
                let n = match (continue_series, cur.pre, cur.dev) {
                    (true, None, Some(n)) => n.saturating_add(1),
                    _ => 1,
                };
                next.dev = Some(n);
            }
            Some(Pep440Label::Pre(kind)) => {
                let n = match (continue_series, cur.pre) {
                    (true, Some((k, n))) if k == *kind && cur.dev.is_none() => n.saturating_add(1),
                    _ => 1,
                };
                next.pre = Some((*kind, n));
            }
        }
        next
    };

    let mut next = build(base, base == triple && cur.is_prerelease());
    if next <= cur {
        next = build(apply_bump(base, bump, current, "pep440")?, false);
    }
    Ok(next.to_string())
}

// CalVer

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalverToken {
    FullYear,
    ShortYear,
    PaddedMonth,
    Month,
    PaddedDay,
    Day,
    Micro,
}

impl CalverToken {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "YYYY" => Self::FullYear,
            "YY" => Self::ShortYear,
            "0M" => Self::PaddedMonth,
            "MM" => Self::Month,
            "0D" => Self::PaddedDay,
            "DD" => Self::Day,
            "MICRO" => Self::Micro,
            _ => return None,
        })
    }

    fn value(self, date: NaiveDate) -> u64 {
        let year = u64::from(date.year().unsigned_abs());
        match self {
            Self::FullYear => year,
            Self::ShortYear => year % 100,
            Self::PaddedMonth | Self::Month => u64::from(date.month()),
            Self::PaddedDay | Self::Day => u64::from(date.day()),
            Self::Micro => 0,
        }
    }

    fn render(self, value: u64) -> String {
        match self {
            Self::PaddedMonth | Self::PaddedDay => format!("{value:02}"),
            _ => value.to_string(),
        }
    }
}

const CALVER_SEPARATORS: [char; 3] = ['.', '-', '_'];

/// A parsed CalVer format such as `YYYY.0M.MICRO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalverFormat {
    source: String,
    tokens: Vec<CalverToken>,
    separators: Vec<char>,
}

impl Default for CalverFormat {
    fn default() -> Self {
        Self {
            source: DEFAULT_CALVER_FORMAT.to_string(),
            tokens: vec![CalverToken::FullYear, CalverToken::Month, CalverToken::Micro],
            separators: vec!['.', '.'],
        }
    }
}

impl CalverFormat {
    /// Parse a format string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown tokens or an empty format.
    pub fn new(format: &str) -> Result<Self> {
        let separators: Vec<char> = format
            .chars()
            .filter(|c| CALVER_SEPARATORS.contains(c))
            .collect();
        let tokens = format
            .split(CALVER_SEPARATORS)
            .map(|t| {
                CalverToken::parse(t).ok_or_else(|| {
                    Error::config(
                        format!("unknown calver token '{t}' in '{format}'"),
                        "Use YYYY, YY, 0M, MM, 0D, DD and MICRO separated by '.', '-' or '_'",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if tokens.iter().all(|t| *t == CalverToken::Micro) {
            return Err(Error::config(
                format!("calver format '{format}' has no date token"),
                "Include at least one of YYYY, YY, MM, 0M, DD or 0D",
            ));
        }
        Ok(Self {
            source: format.to_string(),
            tokens,
            separators,
        })
    }

    /// The original format string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn parse(&self, version: &str) -> Result<Vec<u64>> {
        let invalid = || Error::invalid_version(version, format!("calver ({})", self.source));
        let values = version
            .trim()
            .split(CALVER_SEPARATORS)
            .map(|p| p.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        if values.len() == self.tokens.len() {
            Ok(values)
        } else {
            Err(invalid())
        }
    }

    fn render(&self, values: &[u64]) -> String {
        let mut out = String::new();
        for (i, (token, value)) in self.tokens.iter().zip(values).enumerate() {
            if i > 0 {
                out.push(self.separators.get(i - 1).copied().unwrap_or('.'));
            }
            out.push_str(&token.render(*value));
        }
        out
    }

    fn next(&self, current: &str, today: NaiveDate) -> Result<String> {
        let current = self.parse(current)?;
        let same_period = self
            .tokens
            .iter()
            .zip(&current)
            .filter(|(t, _)| **t != CalverToken::Micro)
            .all(|(t, v)| t.value(today) == *v);

        let values: Vec<u64> = self
            .tokens
            .iter()
            .zip(&current)
            .map(|(t, v)| match t {
                CalverToken::Micro if same_period => v + 1,
                _ => t.value(today),
            })
            .collect();
        Ok(self.render(&values))
    }
}

impl fmt::Display for CalverFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semver() -> VersioningScheme {
        VersioningScheme::default()
    }

    fn next(scheme: &VersioningScheme, v: &str, bump: BumpType, pre: Option<&str>) -> String {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        scheme.next_version_on(v, bump, pre, today).unwrap().unwrap()
    }

    #[test]
    fn test_none_bump_yields_none() {
        assert!(semver().next_version("1.2.3", BumpType::None, None).unwrap().is_none());
    }

    #[test]
    fn test_semver_bumps() {
        let s = semver();
        assert_eq!(next(&s, "1.2.3", BumpType::Patch, None), "1.2.4");
        assert_eq!(next(&s, "1.2.3", BumpType::Minor, None), "1.3.0");
        assert_eq!(next(&s, "1.2.3", BumpType::Major, None), "2.0.0");
        assert_eq!(next(&s, "v1.2.3", BumpType::Patch, None), "1.2.4");
    }

    #[test]
    fn test_bump_overflow_is_invalid_version() {
        let max = u64::MAX;
        let err = semver()
            .next_version(&format!("{max}.0.0"), BumpType::Major, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
        assert!(
            semver()
                .next_version(&format!("1.{max}.0"), BumpType::Minor, None)
                .is_err()
        );
        assert!(
            VersioningScheme::Pep440 { major_on_zero: false }
                .next_version(&format!("1.0.{max}"), BumpType::Patch, None)
                .is_err()
        );
        assert_eq!(next(&semver(), &format!("1.{max}.0"), BumpType::Major, None), "2.0.0");
    }

    #[test]
    fn test_major_on_zero() {
        assert_eq!(next(&semver(), "0.4.2", BumpType::Major, None), "0.5.0");
        let on = VersioningScheme::Semver { major_on_zero: true };
        assert_eq!(next(&on, "0.4.2", BumpType::Major, None), "1.0.0");
    }

    #[test]
    fn test_semver_prerelease_series() {
        let s = semver();
        assert_eq!(next(&s, "1.2.3", BumpType::Minor, Some("rc")), "1.3.0-rc.1");
        assert_eq!(next(&s, "1.3.0-rc.1", BumpType::Minor, Some("rc")), "1.3.0-rc.2");
        assert_eq!(next(&s, "1.3.0-rc.2", BumpType::Patch, Some("rc")), "1.3.0-rc.3");
        assert_eq!(next(&s, "1.3.0-beta.2", BumpType::Minor, Some("rc")), "1.3.0-rc.1");
        // Graduation.
        assert_eq!(next(&s, "1.3.0-rc.2", BumpType::Minor, None), "1.3.0");
        // A larger bump than the series implies moves the base.
        assert_eq!(next(&s, "1.3.0-rc.2", BumpType::Major, None), "2.0.0");
        // Going backwards in label order moves the base instead.
        assert_eq!(next(&s, "1.3.0-rc.2", BumpType::Minor, Some("alpha")), "1.4.0-alpha.1");
    }

    #[test]
    fn test_semver_compare() {
        let s = semver();
        assert_eq!(s.compare("1.0.0-rc.1", "1.0.0").unwrap(), Ordering::Less);
        assert_eq!(s.compare("1.10.0", "1.9.0").unwrap(), Ordering::Greater);
        assert!(s.compare("not-a-version", "1.0.0").is_err());
    }

    #[test]
    fn test_pep440_parse_and_display() {
        for v in ["1.2.3", "1.2.3a1", "1.2.3b2", "1.2.3rc1", "1.2.3.dev4", "1.2.3.post1"] {
            assert_eq!(Pep440Version::parse(v).unwrap().to_string(), v);
        }
        assert_eq!(Pep440Version::parse("1.2.3-alpha.1").unwrap().to_string(), "1.2.3a1");
        assert!(Pep440Version::parse("1!2.0").is_err());
        assert!(Pep440Version::parse("banana").is_err());
    }

    #[test]
    fn test_pep440_ordering() {
        let order = [
            "1.0.0.dev1",
            "1.0.0a1",
            "1.0.0a2",
            "1.0.0b1",
            "1.0.0rc1",
            "1.0.0",
            "1.0.0.post1",
            "1.0.1",
        ];
        let s = VersioningScheme::Pep440 { major_on_zero: false };
        for pair in order.windows(2) {
            assert_eq!(s.compare(pair[0], pair[1]).unwrap(), Ordering::Less, "{pair:?}");
        }
    }

    #[test]
    fn test_pep440_bumps() {
        let s = VersioningScheme::Pep440 { major_on_zero: false };
        assert_eq!(next(&s, "1.2.3", BumpType::Minor, None), "1.3.0");
        assert_eq!(next(&s, "1.2", BumpType::Patch, None), "1.2.1");
        assert_eq!(next(&s, "1.2.3", BumpType::Minor, Some("rc")), "1.3.0rc1");
        assert_eq!(next(&s, "1.3.0rc1", BumpType::Minor, Some("rc")), "1.3.0rc2");
        assert_eq!(next(&s, "1.3.0a3", BumpType::Minor, Some("beta")), "1.3.0b1");
        assert_eq!(next(&s, "1.3.0rc2", BumpType::Patch, None), "1.3.0");
        assert_eq!(next(&s, "1.2.3", BumpType::Patch, Some("dev")), "1.2.4.dev1");
        assert_eq!(next(&s, "1.2.4.dev1", BumpType::Patch, Some("dev")), "1.2.4.dev2");
        assert_eq!(next(&s, "1.0.0.post2", BumpType::Patch, None), "1.0.1");
        assert_eq!(next(&s, "0.9.0", BumpType::Major, None), "0.10.0");
    }

    #[test]
    fn test_pep440_rejects_unknown_label() {
        let s = VersioningScheme::Pep440 { major_on_zero: false };
        assert!(s.next_version("1.0.0", BumpType::Patch, Some("nightly")).is_err());
    }

    #[test]
    fn test_calver_same_and_new_period() {
        let s = VersioningScheme::Calver(CalverFormat::default());
        assert_eq!(next(&s, "2026.10.0", BumpType::Patch, None), "2026.10.1");
        assert_eq!(next(&s, "2026.10.4", BumpType::Major, None), "2026.10.5");
        assert_eq!(next(&s, "2026.9.7", BumpType::Patch, None), "2026.10.0");
    }

    #[test]
    fn test_calver_padded_tokens() {
        let s = VersioningScheme::Calver(CalverFormat::new("YY.0M.0D-MICRO").unwrap());
        assert_eq!(next(&s, "26.10.18-3", BumpType::Patch, None), "26.10.19-0");
        assert_eq!(next(&s, "26.10.19-3", BumpType::Patch, None), "26.10.19-4");
        assert_eq!(s.compare("26.10.19-4", "26.10.19-10").unwrap(), Ordering::Less);
    }

    #[test]
    fn test_calver_rejects_bad_format_and_labels() {
        assert!(CalverFormat::new("YYYY.WW").is_err());
        assert!(CalverFormat::new("MICRO").is_err());
        let s = VersioningScheme::Calver(CalverFormat::default());
        assert!(s.next_version("2026.10.0", BumpType::Patch, Some("rc")).is_err());
        assert!(s.validate("2026.10").is_err());
    }

    #[test]
    fn test_propagation_policy() {
        assert_eq!(PropagationPolicy::Patch.cap(BumpType::Major), BumpType::Patch);
        assert_eq!(PropagationPolicy::Patch.cap(BumpType::None), BumpType::None);
        assert_eq!(PropagationPolicy::Match.cap(BumpType::Major), BumpType::Major);
        assert_eq!(PropagationPolicy::Match.cap(BumpType::Minor), BumpType::Patch);
    }
}
