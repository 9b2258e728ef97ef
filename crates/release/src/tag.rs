//! Release tag parsing and lookup.
//!
//! Release tags are formatted as `<moniker>@<version>`. Monikers may contain
//! `@` themselves (`@scope/pkg@1.2.3`), so the version starts after the last
//! `@`.

use crate::error::{Error, Result};
use crate::version::{PR_LABEL, Version};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A parsed `<moniker>@<version>` release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    /// Package moniker.
    pub package: String,
    /// Released version.
    pub version: Version,
}

impl ReleaseTag {
    /// Create a new release tag.
    #[must_use]
    pub fn new(package: impl Into<String>, version: Version) -> Self {
        Self {
            package: package.into(),
            version,
        }
    }

    /// Parse a tag name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if the tag has no moniker or its version
    /// part is not semver.
    pub fn parse(tag: &str) -> Result<Self> {
        let (package, version) = tag.rsplit_once('@').ok_or_else(|| Error::invalid_tag(tag))?;
        if package.is_empty() {
            return Err(Error::invalid_tag(tag));
        }
        let version = version.parse().map_err(|_| Error::invalid_tag(tag))?;
        Ok(Self::new(package, version))
    }

    /// The tag name for this release.
    #[must_use]
    pub fn name(&self) -> String {
        format_tag(&self.package, &self.version)
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}

/// Format a release tag name.
#[must_use]
pub fn format_tag(package: &str, version: &Version) -> String {
    format!("{package}@{version}")
}

/// Per-package index of all parseable release tags.
///
/// Malformed tags are skipped, never an error.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    by_package: BTreeMap<String, Vec<Version>>,
}

impl TagIndex {
    /// Build an index from raw tag names.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_package: BTreeMap<String, Vec<Version>> = BTreeMap::new();
        for tag in tags {
            let tag = tag.as_ref();
            match ReleaseTag::parse(tag) {
                Ok(parsed) => by_package
                    .entry(parsed.package)
                    .or_default()
                    .push(parsed.version),
                Err(_) => debug!(tag, "Skipping non-release tag"),
            }
        }
        for versions in by_package.values_mut() {
            versions.sort();
            versions.dedup();
        }
        Self { by_package }
    }

    /// All tagged versions of a package, in ascending precedence.
    #[must_use]
    pub fn versions(&self, package: &str) -> &[Version] {
        self.by_package.get(package).map_or(&[], Vec::as_slice)
    }

    /// Highest non-prerelease version of a package.
    #[must_use]
    pub fn last_stable(&self, package: &str) -> Option<&Version> {
        self.versions(package)
            .iter()
            .rev()
            .find(|v| !v.is_prerelease())
    }

    /// Tag name of the last stable release of a package.
    #[must_use]
    pub fn last_stable_tag(&self, package: &str) -> Option<String> {
        self.last_stable(package).map(|v| format_tag(package, v))
    }

    /// Iterations of existing `next.N` previews of `target`.
    pub fn preview_iterations<'a>(
        &'a self,
        package: &str,
        target: &'a Version,
    ) -> impl Iterator<Item = u64> + 'a {
        self.versions(package)
            .iter()
            .filter(move |v| v.base() == *target)
            .filter_map(Version::preview_iteration)
    }

    /// Number of existing PR tags of a package for `pr_number`.
    #[must_use]
    pub fn pr_tag_count(&self, package: &str, pr_number: u64) -> usize {
        self.versions(package)
            .iter()
            .filter(|v| {
                v.pr_identifier()
                    .is_some_and(|(number, _, _)| number == pr_number)
            })
            .count()
    }

    /// Whether a version is a PR build.
    #[must_use]
    pub fn is_pr_version(version: &Version) -> bool {
        version
            .prerelease_identifiers()
            .next()
            .is_some_and(|id| id == PR_LABEL)
    }

    /// Packages that have at least one release tag.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.by_package.keys().map(String::as_str)
    }
}
