//! Side-effecting collaborators the executor drives.
//!
//! Concrete implementations shell out to package managers and release
//! hosts; the executor only sees these traits.

use crate::error::Result;
use crate::store::NodeStore;
use async_trait::async_trait;
use monorel_release::{VersionControl, Version};
use std::sync::Arc;

/// Options for a single publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Registry dist-tag, `None` for the registry default.
    pub dist_tag: Option<String>,
    /// Registry override.
    pub registry: Option<String>,
}

/// Publishes packages to their registry.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `package` at `version`.
    async fn publish(&self, package: &str, version: &Version, options: &PublishOptions)
    -> Result<()>;
}

/// A release record to create on the release host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    /// Tag the release is attached to.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Whether to mark the release as a prerelease.
    pub prerelease: bool,
}

/// External release records (e.g. GitHub releases).
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Whether a release exists for `tag`.
    async fn release_exists(&self, tag: &str) -> Result<bool>;

    /// Create a release.
    async fn create_release(&self, release: &NewRelease) -> Result<()>;

    /// Replace the body of the release for `tag`.
    async fn update_release(&self, tag: &str, body: &str) -> Result<()>;
}

/// Global gate run before any side effect.
#[async_trait]
pub trait Preflight: Send + Sync {
    /// Fail if the run must not proceed.
    async fn check(&self) -> Result<()>;
}

/// Preflight that always passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreflight;

#[async_trait]
impl Preflight for NoPreflight {
    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Everything the executor needs to touch the outside world.
#[derive(Clone)]
pub struct Capabilities {
    /// Version control.
    pub vcs: Arc<dyn VersionControl>,
    /// Release host.
    pub host: Arc<dyn ReleaseHost>,
    /// Package publisher.
    pub publisher: Arc<dyn Publisher>,
    /// Preflight gate.
    pub preflight: Arc<dyn Preflight>,
    /// Node-state store.
    pub store: Arc<dyn NodeStore>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
