//! The release plan handed from planning to execution.
//!
//! A [`Plan`] is immutable once produced. It is persisted as JSON between
//! `monorel plan` and `monorel apply`, and its content hash identifies the
//! workflow that executes it.

use crate::commit::ReleaseCommit;
use crate::error::{Error, Result};
use crate::tag::format_tag;
use crate::version::{BumpType, Lifecycle, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Default repo-relative location of the persisted plan.
pub const DEFAULT_PLAN_PATH: &str = ".monorel/plan.json";

/// Lifecycle-specific identifiers of a planned release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemLifecycle {
    /// A stable release.
    Stable,
    /// A `next.N` preview.
    Preview {
        /// The `N` of `next.N`.
        iteration: u64,
    },
    /// A pull-request build.
    PullRequest {
        /// Pull request number.
        pr_number: u64,
        /// Per-PR build counter.
        iteration: u64,
        /// Full head commit of the pull request.
        sha: String,
    },
}

impl ItemLifecycle {
    /// The run-level lifecycle this item belongs to.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::Stable => Lifecycle::Stable,
            Self::Preview { .. } => Lifecycle::Preview,
            Self::PullRequest { .. } => Lifecycle::Pr,
        }
    }
}

/// A planned release of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseItem {
    /// Package moniker.
    pub package: String,
    /// Directory-derived short name, used to project multi-scope commits.
    pub scope: String,
    /// Phase-mapped bump applied to the current version.
    pub bump: BumpType,
    /// Last stable version, if the package was released before.
    pub current_version: Option<Version>,
    /// The version to publish and tag.
    pub next_version: Version,
    /// The stable version this release leads towards.
    pub target_version: Version,
    /// Commits explaining the release.
    pub commits: Vec<ReleaseCommit>,
    /// Lifecycle-specific identifiers.
    pub lifecycle: ItemLifecycle,
}

impl ReleaseItem {
    /// Tag name for this release.
    #[must_use]
    pub fn tag_name(&self) -> String {
        format_tag(&self.package, &self.next_version)
    }

    /// Whether this release publishes a prerelease version.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.next_version.is_prerelease()
    }

    /// Whether this item only releases because a dependency released.
    #[must_use]
    pub fn is_cascade(&self) -> bool {
        !self.commits.is_empty() && self.commits.iter().all(ReleaseCommit::is_cascade)
    }
}

/// An immutable release plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Lifecycle of every item in the plan.
    pub lifecycle: Lifecycle,
    /// When the plan was produced.
    pub timestamp: DateTime<Utc>,
    /// Packages with direct commit-driven bumps.
    pub releases: Vec<ReleaseItem>,
    /// Packages released only because a dependency released.
    pub cascades: Vec<ReleaseItem>,
}

impl Plan {
    /// Whether the plan releases nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty() && self.cascades.is_empty()
    }

    /// All items, direct releases first.
    pub fn items(&self) -> impl Iterator<Item = &ReleaseItem> {
        self.releases.iter().chain(&self.cascades)
    }

    /// Look up the item for a package.
    #[must_use]
    pub fn item(&self, package: &str) -> Option<&ReleaseItem> {
        self.items().find(|item| item.package == package)
    }

    /// Content-derived workflow id.
    ///
    /// Identical plans share an id, so re-applying a plan resumes its
    /// workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be serialized.
    pub fn workflow_id(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// Write the plan as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::plan_io(
                    "failed to create plan directory",
                    Some(parent.to_path_buf()),
                    Some(e),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            Error::plan_io("failed to write plan", Some(path.to_path_buf()), Some(e))
        })?;
        debug!(path = %path.display(), items = self.items().count(), "Saved release plan");
        Ok(())
    }

    /// Read a plan written by [`Plan::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a valid plan.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::plan_io("failed to read plan", Some(path.to_path_buf()), Some(e))
        })?;
        let plan = serde_json::from_str(&content)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Classification, CommitType};
    use tempfile::TempDir;

    fn item(package: &str, version: &str) -> ReleaseItem {
        ReleaseItem {
            package: package.to_string(),
            scope: package.to_string(),
            bump: BumpType::Minor,
            current_version: Some(Version::new(1, 0, 0)),
            next_version: version.parse().unwrap(),
            target_version: Version::new(1, 1, 0),
            commits: vec![ReleaseCommit {
                hash: "abc".to_string(),
                author: "dev".to_string(),
                date: DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
                classification: Classification::Single {
                    commit_type: CommitType::Feat,
                    scopes: vec![],
                    breaking: false,
                    message: "add feature".to_string(),
                },
            }],
            lifecycle: ItemLifecycle::Stable,
        }
    }

    fn plan() -> Plan {
        Plan {
            lifecycle: Lifecycle::Stable,
            timestamp: DateTime::parse_from_rfc3339("2024-05-02T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            releases: vec![item("core", "1.1.0")],
            cascades: vec![],
        }
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(item("@scope/core", "1.1.0").tag_name(), "@scope/core@1.1.0");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".monorel").join("plan.json");
        let plan = plan();
        plan.save(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Plan::load(&path).unwrap(), plan);
    }

    #[test]
    fn test_load_missing_plan() {
        let dir = TempDir::new().unwrap();
        let err = Plan::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::PlanIo { .. }));
    }

    #[test]
    fn test_workflow_id_is_content_derived() {
        let a = plan();
        let b = plan();
        assert_eq!(a.workflow_id().unwrap(), b.workflow_id().unwrap());
        assert_eq!(a.workflow_id().unwrap().len(), 64);

        let mut c = plan();
        c.releases[0].next_version = Version::new(1, 2, 0);
        assert_ne!(a.workflow_id().unwrap(), c.workflow_id().unwrap());
    }

    #[test]
    fn test_items_order_and_lookup() {
        let mut plan = plan();
        plan.cascades.push(item("cli", "2.0.1"));
        let names: Vec<&str> = plan.items().map(|i| i.package.as_str()).collect();
        assert_eq!(names, vec!["core", "cli"]);
        assert!(plan.item("cli").is_some());
        assert!(plan.item("web").is_none());
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_is_cascade() {
        let mut cascade = item("cli", "2.0.1");
        cascade.commits = vec![ReleaseCommit::cascade(
            "core",
            Version::new(1, 1, 0),
            Utc::now(),
        )];
        assert!(cascade.is_cascade());
        assert!(!item("core", "1.1.0").is_cascade());
    }
}
