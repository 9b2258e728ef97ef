//! Per-package commit collection.

use crate::git::GitCli;
use monorel_release::{
    CommitClassifier, CommitLog, Error, Package, ReleaseCommit, Result, TagIndex,
};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Reads and classifies each package's commits since its last stable tag.
pub struct CommitCollector<'a> {
    git: &'a GitCli,
    classifier: &'a dyn CommitClassifier,
}

impl<'a> CommitCollector<'a> {
    /// Create a collector.
    #[must_use]
    pub fn new(git: &'a GitCli, classifier: &'a dyn CommitClassifier) -> Self {
        Self { git, classifier }
    }

    /// Repository-relative path of a package directory.
    fn relative_path(&self, package: &Package) -> PathBuf {
        let relative = package
            .path
            .strip_prefix(self.git.root())
            .unwrap_or(&package.path);
        if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative.to_path_buf()
        }
    }

    /// Classified commits of one package, newest first.
    ///
    /// Commits without conventional structure are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the git history cannot be read.
    pub async fn collect_package(
        &self,
        package: &Package,
        tags: &TagIndex,
    ) -> Result<Vec<ReleaseCommit>> {
        let since = tags.last_stable_tag(&package.name);
        let range = since.as_ref().map(|tag| format!("{tag}..HEAD"));
        let path = self.relative_path(package);
        let raw = self.git.log(range.as_deref(), Some(path.as_path())).await?;

        let mut commits = Vec::with_capacity(raw.len());
        for commit in raw {
            match self.classifier.classify(&commit.hash, &commit.message) {
                Ok(classification) => commits.push(ReleaseCommit {
                    hash: commit.hash,
                    author: commit.author,
                    date: commit.date,
                    classification,
                }),
                Err(Error::Classification { hash, message }) => {
                    warn!(
                        package = %package.name,
                        %hash,
                        reason = %message,
                        "Skipping unstructured commit"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            package = %package.name,
            since = since.as_deref().unwrap_or("<root>"),
            commits = commits.len(),
            "Collected commits"
        );
        Ok(commits)
    }

    /// Classified commits of every package.
    ///
    /// # Errors
    ///
    /// Returns an error if the git history cannot be read.
    pub async fn collect(&self, packages: &[Package], tags: &TagIndex) -> Result<CommitLog> {
        let mut log = CommitLog::new();
        for package in packages {
            let commits = self.collect_package(package, tags).await?;
            log.insert(package.name.clone(), commits);
        }
        Ok(log)
    }
}
