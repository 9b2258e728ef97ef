//! Commit-order-implies-version-order validation.
//!
//! A version tagged at a commit must be greater than every version of the
//! same package tagged on an ancestor commit and less than every version
//! tagged on a descendant. Tags on unrelated branches are not compared.

use crate::error::Result;
use crate::tag::{ReleaseTag, TagIndex};
use crate::vcs::VersionControl;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Position of an existing tag relative to the checked commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The existing tag is on an ancestor commit.
    Ancestor,
    /// The existing tag is on a descendant commit.
    Descendant,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ancestor => write!(f, "ancestor"),
            Self::Descendant => write!(f, "descendant"),
        }
    }
}

/// A detected ordering violation. Reported, never corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Package moniker.
    pub package: String,
    /// Version being checked.
    pub version: Version,
    /// Conflicting existing version.
    pub existing_version: Version,
    /// Commit of the conflicting tag.
    pub existing_sha: String,
    /// Where the conflicting tag sits relative to the checked commit.
    pub relationship: Relationship,
    /// Human readable description.
    pub message: String,
}

impl Violation {
    fn new(
        package: &str,
        version: &Version,
        existing: &TaggedCommit,
        relationship: Relationship,
    ) -> Self {
        let expectation = match relationship {
            Relationship::Ancestor => "greater than",
            Relationship::Descendant => "less than",
        };
        let message = format!(
            "{package}@{version} must be {expectation} {package}@{} tagged on {relationship} commit {}",
            existing.version, existing.sha
        );
        Self {
            package: package.to_string(),
            version: version.clone(),
            existing_version: existing.version.clone(),
            existing_sha: existing.sha.clone(),
            relationship,
            message,
        }
    }
}

/// A release tag resolved to its commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCommit {
    /// Tagged version.
    pub version: Version,
    /// Commit the tag points at.
    pub sha: String,
}

/// Validates version assignments against git ancestry.
pub struct MonotonicValidator<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> MonotonicValidator<'a> {
    /// Create a validator over a version-control collaborator.
    #[must_use]
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    /// Resolve the package's release tags to commits.
    ///
    /// PR builds are all pinned at `0.0.0` and are not ordered.
    async fn resolve(&self, package: &str, tags: &[String]) -> Result<Vec<TaggedCommit>> {
        let mut resolved = Vec::new();
        for tag in tags {
            let Ok(parsed) = ReleaseTag::parse(tag) else {
                continue;
            };
            if parsed.package != package || TagIndex::is_pr_version(&parsed.version) {
                continue;
            }
            let sha = self.vcs.tag_sha(tag).await?;
            resolved.push(TaggedCommit {
                version: parsed.version,
                sha,
            });
        }
        Ok(resolved)
    }

    /// Keep only the tags with no other candidate between them and `sha`.
    ///
    /// With `Relationship::Ancestor`, a candidate is nearest when no other
    /// candidate descends from it; with `Relationship::Descendant`, when it
    /// descends from no other candidate.
    async fn nearest(
        &self,
        candidates: Vec<TaggedCommit>,
        relationship: Relationship,
    ) -> Result<Vec<TaggedCommit>> {
        let mut nearest = Vec::new();
        for candidate in &candidates {
            let mut shadowed = false;
            for other in &candidates {
                if other.sha == candidate.sha {
                    continue;
                }
                let (older, newer) = match relationship {
                    Relationship::Ancestor => (&candidate.sha, &other.sha),
                    Relationship::Descendant => (&other.sha, &candidate.sha),
                };
                if self.vcs.is_ancestor(older, newer).await? {
                    shadowed = true;
                    break;
                }
            }
            if !shadowed {
                nearest.push(candidate.clone());
            }
        }
        Ok(nearest)
    }

    /// Check a proposed `package@version` at `sha` against the nearest tagged
    /// ancestor and descendant commits.
    ///
    /// # Errors
    ///
    /// Returns an error if a version-control query fails.
    #[tracing::instrument(
        name = "validate_adjacent",
        skip_all,
        fields(package = %package, version = %version)
    )]
    pub async fn validate_adjacent(
        &self,
        sha: &str,
        package: &str,
        version: &Version,
        tags: &[String],
    ) -> Result<Vec<Violation>> {
        let tagged = self.resolve(package, tags).await?;
        let mut ancestors = Vec::new();
        let mut descendants = Vec::new();
        for existing in tagged {
            if self.vcs.is_ancestor(&existing.sha, sha).await? {
                ancestors.push(existing);
            } else if self.vcs.is_ancestor(sha, &existing.sha).await? {
                descendants.push(existing);
            }
        }

        let mut violations = Vec::new();
        for existing in self.nearest(ancestors, Relationship::Ancestor).await? {
            if *version <= existing.version {
                violations.push(Violation::new(
                    package,
                    version,
                    &existing,
                    Relationship::Ancestor,
                ));
            }
        }
        for existing in self.nearest(descendants, Relationship::Descendant).await? {
            if *version >= existing.version {
                violations.push(Violation::new(
                    package,
                    version,
                    &existing,
                    Relationship::Descendant,
                ));
            }
        }

        for violation in &violations {
            warn!(detail = %violation.message, "Monotonic version violation");
        }
        Ok(violations)
    }

    /// Check every pair of existing tags of `package`.
    ///
    /// Each violating pair is reported once, from the point of view of the
    /// descendant tag.
    ///
    /// # Errors
    ///
    /// Returns an error if a version-control query fails.
    #[tracing::instrument(name = "audit", skip_all, fields(package = %package))]
    pub async fn audit(&self, package: &str, tags: &[String]) -> Result<Vec<Violation>> {
        let tagged = self.resolve(package, tags).await?;
        debug!(tags = tagged.len(), "Auditing tag history");

        let mut violations = Vec::new();
        for (i, first) in tagged.iter().enumerate() {
            for second in &tagged[i + 1..] {
                if first.sha == second.sha {
                    continue;
                }
                let (older, newer) = if self.vcs.is_ancestor(&first.sha, &second.sha).await? {
                    (first, second)
                } else if self.vcs.is_ancestor(&second.sha, &first.sha).await? {
                    (second, first)
                } else {
                    continue;
                };
                if older.version >= newer.version {
                    violations.push(Violation::new(
                        package,
                        &newer.version,
                        older,
                        Relationship::Ancestor,
                    ));
                }
            }
        }

        for violation in &violations {
            warn!(detail = %violation.message, "Monotonic version violation");
        }
        Ok(violations)
    }
}
