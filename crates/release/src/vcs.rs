//! Version-control collaborator.

use crate::error::Result;
use async_trait::async_trait;

/// Narrow interface onto the repository's version control.
///
/// The git CLI implementation lives in `monorel-vcs`; tests use in-memory
/// doubles.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// All tag names in the repository.
    async fn tags(&self) -> Result<Vec<String>>;

    /// Commit a tag points at.
    async fn tag_sha(&self, tag: &str) -> Result<String>;

    /// Whether `ancestor` is an ancestor of (or equal to) `descendant`.
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Current `HEAD` commit.
    async fn head_sha(&self) -> Result<String>;

    /// Current branch name.
    async fn current_branch(&self) -> Result<String>;

    /// Create an annotated tag at `HEAD`.
    async fn create_tag(&self, name: &str, message: &str) -> Result<()>;

    /// Push a tag to `remote`. Preview tags may be force-updated.
    async fn push_tag(&self, name: &str, remote: &str, is_preview: bool) -> Result<()>;

    /// Whether a tag exists locally.
    async fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tags().await?.iter().any(|t| t == name))
    }
}
