//! Version calculation and bumping logic.
//!
//! This module provides semantic versioning support including:
//! - Version parsing, formatting and `SemVer` 2.0 precedence
//! - Phase-aware bump mapping (initial development vs public API)
//! - Next-version calculation for the stable, preview and pull-request lifecycles

use crate::error::{Error, Result};
use crate::plan::ItemLifecycle;
use crate::tag::TagIndex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Prerelease label used by the preview lifecycle (`1.2.0-next.3`).
pub const PREVIEW_LABEL: &str = "next";

/// Prerelease label used by the pull-request lifecycle (`0.0.0-pr.42.1.abc1234`).
pub const PR_LABEL: &str = "pr";

/// Number of commit-hash characters embedded in PR prerelease identifiers.
pub const SHORT_SHA_LEN: usize = 7;

/// Type of version bump for a package.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// No version change.
    #[default]
    None,
    /// Patch version bump (0.0.X).
    Patch,
    /// Minor version bump (0.X.0).
    Minor,
    /// Major version bump (X.0.0).
    Major,
}

impl BumpType {
    /// Parse a bump type from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid bump type.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "none" => Ok(Self::None),
            _ => Err(Error::config(
                format!("Invalid bump type: {s}"),
                "Expected major, minor, patch, or none",
            )),
        }
    }

    /// Get the higher of two bump types.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if self > other { self } else { other }
    }

    /// Whether this bump changes nothing.
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// Semver interpretation phase of a version line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `0.x.y`: the public API is not stable yet.
    InitialDevelopment,
    /// `x.y.z` with `x >= 1`.
    PublicApi,
}

/// Release lifecycle of a planning run.
///
/// Exactly one lifecycle applies to a whole plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Regular releases.
    #[default]
    Stable,
    /// Rolling `next.N` prereleases of the upcoming stable version.
    Preview,
    /// Throwaway `0.0.0-pr.<n>.<iteration>.<sha>` builds of a pull request.
    Pr,
}

impl Lifecycle {
    /// Whether versions of this lifecycle carry a prerelease identifier.
    #[must_use]
    pub const fn is_prerelease(self) -> bool {
        !matches!(self, Self::Stable)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Preview => write!(f, "preview"),
            Self::Pr => write!(f, "pr"),
        }
    }
}

impl FromStr for Lifecycle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "preview" | "next" => Ok(Self::Preview),
            "pr" | "pull-request" => Ok(Self::Pr),
            _ => Err(Error::config(
                format!("Unknown lifecycle: {s}"),
                "Expected stable, preview, or pr",
            )),
        }
    }
}

/// A semantic version following the `SemVer` 2.0.0 specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
    /// Pre-release identifier (e.g., "next.1", "pr.42.1.abc1234").
    pub prerelease: Option<String>,
    /// Build metadata (e.g., "20230101", "commit.abc123").
    pub build: Option<String>,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Create a version with a pre-release identifier.
    #[must_use]
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Create a version with build metadata.
    #[must_use]
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// The `major.minor.patch` core with prerelease and build stripped.
    #[must_use]
    pub const fn base(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    /// Apply a bump type to this version, without phase mapping.
    #[must_use]
    pub fn bump(&self, bump_type: BumpType) -> Self {
        match bump_type {
            BumpType::Major => Self::new(self.major + 1, 0, 0),
            BumpType::Minor => Self::new(self.major, self.minor + 1, 0),
            BumpType::Patch => Self::new(self.major, self.minor, self.patch + 1),
            BumpType::None => self.base(),
        }
    }

    /// Check if this is a pre-release version.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The semver phase of this version.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.major == 0 {
            Phase::InitialDevelopment
        } else {
            Phase::PublicApi
        }
    }

    /// Get the phase-mapped bump type.
    ///
    /// While `major < 1` every breaking or feature change only moves the minor
    /// field; an explicit patch stays a patch.
    #[must_use]
    pub fn adjusted_bump_type(&self, bump: BumpType) -> BumpType {
        match (self.phase(), bump) {
            (Phase::InitialDevelopment, BumpType::Major) => BumpType::Minor,
            _ => bump,
        }
    }

    /// Apply a bump after phase mapping.
    #[must_use]
    pub fn bump_phased(&self, bump: BumpType) -> Self {
        self.bump(self.adjusted_bump_type(bump))
    }

    /// Dot-separated prerelease identifiers.
    pub fn prerelease_identifiers(&self) -> impl Iterator<Item = &str> {
        self.prerelease
            .as_deref()
            .into_iter()
            .flat_map(|pre| pre.split('.'))
    }

    /// The `N` of a `next.N` preview prerelease.
    #[must_use]
    pub fn preview_iteration(&self) -> Option<u64> {
        let mut ids = self.prerelease_identifiers();
        match (ids.next(), ids.next(), ids.next()) {
            (Some(PREVIEW_LABEL), Some(n), None) => n.parse().ok(),
            _ => None,
        }
    }

    /// The `(pr_number, iteration, sha)` of a `pr.<n>.<iteration>.<sha>` prerelease.
    #[must_use]
    pub fn pr_identifier(&self) -> Option<(u64, u64, &str)> {
        let mut ids = self.prerelease_identifiers();
        match (ids.next(), ids.next(), ids.next(), ids.next(), ids.next()) {
            (Some(PR_LABEL), Some(number), Some(iteration), Some(sha), None) => {
                Some((number.parse().ok()?, iteration.parse().ok()?, sha))
            }
            _ => None,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // Remove leading 'v' if present
        let s = s.strip_prefix('v').unwrap_or(s);

        // Split off build metadata
        let (version_pre, build) = match s.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (s, None),
        };

        // Split off prerelease
        let (version, prerelease) = match version_pre.split_once('-') {
            Some((v, p)) => (v, Some(p.to_string())),
            None => (version_pre, None),
        };

        if prerelease
            .as_deref()
            .is_some_and(|p| p.is_empty() || p.split('.').any(str::is_empty))
        {
            return Err(Error::invalid_version(s));
        }

        let parts: Vec<&str> = version.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(Error::invalid_version(s));
        };

        let major = major
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid major version: {major}")))?;
        let minor = minor
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid minor version: {minor}")))?;
        let patch = patch
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid patch version: {patch}")))?;

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // Pre-release versions have lower precedence
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
        // Build metadata is ignored in comparison
    }
}

/// Compare two prerelease strings identifier by identifier.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    // Numeric identifiers always have lower precedence
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Pull request coordinates for the PR lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrContext {
    /// Pull request number.
    pub number: u64,
    /// Head commit of the pull request.
    pub sha: String,
}

impl PrContext {
    /// Create a new PR context.
    #[must_use]
    pub fn new(number: u64, sha: impl Into<String>) -> Self {
        Self {
            number,
            sha: sha.into(),
        }
    }

    /// The abbreviated commit hash embedded in PR versions.
    #[must_use]
    pub fn short_sha(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(SHORT_SHA_LEN)
            .map_or(self.sha.len(), |(idx, _)| idx);
        &self.sha[..end]
    }
}

/// The release mode a calculation runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Stable lifecycle.
    Stable,
    /// Preview lifecycle.
    Preview,
    /// PR lifecycle for the given pull request.
    Pr(PrContext),
}

impl ReleaseMode {
    /// Build a release mode from a lifecycle and optional PR context.
    ///
    /// # Errors
    ///
    /// Returns an error if the PR lifecycle is requested without PR context.
    pub fn new(lifecycle: Lifecycle, pr: Option<PrContext>) -> Result<Self> {
        match lifecycle {
            Lifecycle::Stable => Ok(Self::Stable),
            Lifecycle::Preview => Ok(Self::Preview),
            Lifecycle::Pr => pr.map(Self::Pr).ok_or_else(|| {
                Error::missing_pr_context("the pr lifecycle requires a PR number and head commit")
            }),
        }
    }

    /// The lifecycle of this mode.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::Stable => Lifecycle::Stable,
            Self::Preview => Lifecycle::Preview,
            Self::Pr(_) => Lifecycle::Pr,
        }
    }
}

/// Result of a next-version calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextVersion {
    /// The version to publish and tag.
    pub version: Version,
    /// The stable target all lifecycles agree on.
    pub target: Version,
    /// Lifecycle-specific identifiers.
    pub lifecycle: ItemLifecycle,
}

/// Calculator turning `(current version, bump, lifecycle)` into a next version.
///
/// Existing tags are consulted for preview and PR iterations.
pub struct VersionCalculator<'a> {
    tags: &'a TagIndex,
}

impl<'a> VersionCalculator<'a> {
    /// Create a new version calculator over the repository's release tags.
    #[must_use]
    pub const fn new(tags: &'a TagIndex) -> Self {
        Self { tags }
    }

    /// The stable version a bump leads to.
    ///
    /// A first release starts from `0.0.0`, so it always lands below `1.0.0`.
    #[must_use]
    pub fn stable_target(current: Option<&Version>, bump: BumpType) -> Version {
        current.cloned().unwrap_or_default().base().bump_phased(bump)
    }

    /// Calculate the next version of `package` under `mode`.
    #[must_use]
    pub fn calculate(
        &self,
        package: &str,
        current: Option<&Version>,
        bump: BumpType,
        mode: &ReleaseMode,
    ) -> NextVersion {
        let target = Self::stable_target(current, bump);
        match mode {
            ReleaseMode::Stable => NextVersion {
                version: target.clone(),
                target,
                lifecycle: ItemLifecycle::Stable,
            },
            ReleaseMode::Preview => {
                let iteration = self
                    .tags
                    .preview_iterations(package, &target)
                    .max()
                    .map_or(1, |n| n + 1);
                NextVersion {
                    version: target
                        .clone()
                        .with_prerelease(format!("{PREVIEW_LABEL}.{iteration}")),
                    target,
                    lifecycle: ItemLifecycle::Preview { iteration },
                }
            }
            ReleaseMode::Pr(pr) => {
                let iteration = self.tags.pr_tag_count(package, pr.number) as u64 + 1;
                let version = Version::default().with_prerelease(format!(
                    "{PR_LABEL}.{}.{iteration}.{}",
                    pr.number,
                    pr.short_sha()
                ));
                NextVersion {
                    version,
                    target,
                    lifecycle: ItemLifecycle::PullRequest {
                        pr_number: pr.number,
                        iteration,
                        sha: pr.sha.clone(),
                    },
                }
            }
        }
    }
}
