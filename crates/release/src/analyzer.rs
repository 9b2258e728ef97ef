//! Per-package impact analysis.
//!
//! Folds the classified commits of each package since its last stable tag
//! into a single bump decision.

use crate::commit::ReleaseCommit;
use crate::package::Package;
use crate::tag::TagIndex;
use crate::version::{BumpType, Version};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Classified commits per package moniker, newest first.
pub type CommitLog = BTreeMap<String, Vec<ReleaseCommit>>;

/// The release decision for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Impact {
    /// Package moniker.
    pub package: String,
    /// Package scope the commits were projected onto.
    pub scope: String,
    /// Highest bump among the commits (never `None`).
    pub bump: BumpType,
    /// Every commit since the last release, including ones without a bump.
    pub commits: Vec<ReleaseCommit>,
    /// Last stable version, if any.
    pub current_version: Option<Version>,
}

/// Computes [`Impact`]s from commits and existing tags.
pub struct ImpactAnalyzer<'a> {
    tags: &'a TagIndex,
}

impl<'a> ImpactAnalyzer<'a> {
    /// Create a new analyzer over the repository's release tags.
    #[must_use]
    pub const fn new(tags: &'a TagIndex) -> Self {
        Self { tags }
    }

    /// Fold the bumps of `commits` as seen from `scope`.
    #[must_use]
    pub fn fold_bump(scope: &str, commits: &[ReleaseCommit]) -> BumpType {
        commits
            .iter()
            .map(|c| c.bump_for_scope(scope))
            .fold(BumpType::None, BumpType::max)
    }

    /// Analyze one package.
    ///
    /// Returns `None` when no commit warrants a release.
    #[must_use]
    pub fn analyze_package(&self, package: &Package, commits: &[ReleaseCommit]) -> Option<Impact> {
        let bump = Self::fold_bump(&package.scope, commits);
        trace!(
            package = %package.name,
            commits = commits.len(),
            bump = %bump,
            "Folded commit bumps"
        );
        if bump.is_none() {
            return None;
        }
        Some(Impact {
            package: package.name.clone(),
            scope: package.scope.clone(),
            bump,
            commits: commits.to_vec(),
            current_version: self.tags.last_stable(&package.name).cloned(),
        })
    }

    /// Analyze all packages, in package order.
    #[must_use]
    pub fn analyze(&self, packages: &[Package], commits: &CommitLog) -> Vec<Impact> {
        let impacts: Vec<Impact> = packages
            .iter()
            .filter_map(|package| {
                let package_commits = commits.get(&package.name).map_or(&[][..], Vec::as_slice);
                self.analyze_package(package, package_commits)
            })
            .collect();
        debug!(
            packages = packages.len(),
            impacted = impacts.len(),
            "Impact analysis complete"
        );
        impacts
    }
}
