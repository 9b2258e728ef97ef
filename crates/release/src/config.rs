//! Release configuration types.
//!
//! Configuration is read from `monorel.toml` at the repository root. Every
//! section is optional and falls back to its defaults.

use crate::error::{Error, Result};
use crate::plan::DEFAULT_PLAN_PATH;
use crate::version::Lifecycle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration file at the repository root.
pub const CONFIG_FILE: &str = "monorel.toml";

/// Complete release configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Git-related release settings.
    pub git: ReleaseGitConfig,
    /// Plan persistence settings.
    pub plan: PlanConfig,
    /// Workflow execution settings.
    pub workflow: WorkflowConfig,
    /// Package publishing settings.
    pub publish: PublishConfig,
    /// Preflight checks.
    pub preflight: PreflightConfig,
}

/// Git-related release configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseGitConfig {
    /// Remote that tags are pushed to.
    pub remote: String,
    /// Default branch for releases.
    pub default_branch: String,
}

impl Default for ReleaseGitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            default_branch: "main".to_string(),
        }
    }
}

/// Plan persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Repo-relative path of the persisted plan.
    pub path: PathBuf,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PLAN_PATH),
        }
    }
}

/// Workflow execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Repo-relative path of the node-state database.
    pub state_path: PathBuf,
    /// Maximum concurrently running nodes (0 = available parallelism).
    pub max_parallel: usize,
    /// First retry delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for retry delays in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".monorel/workflow.db"),
            max_parallel: 0,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// Package publishing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Publish command template.
    ///
    /// Supports `{name}`, `{version}`, `{path}`, `{dist_tag}` and
    /// `{registry}` placeholders.
    pub command: String,
    /// Registry to publish to, if not the default one.
    pub registry: Option<String>,
    /// Dist-tag for preview releases.
    pub preview_dist_tag: String,
    /// Refuse to publish when the package manifest does not already carry
    /// the planned version.
    pub check_manifest_version: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            command: "cargo publish --package {name} --allow-dirty".to_string(),
            registry: None,
            preview_dist_tag: "next".to_string(),
            check_manifest_version: true,
        }
    }
}

impl PublishConfig {
    /// Dist-tag a release of the given lifecycle publishes under.
    ///
    /// Stable releases use the registry default.
    #[must_use]
    pub fn dist_tag(&self, lifecycle: Lifecycle, pr_number: Option<u64>) -> Option<String> {
        match lifecycle {
            Lifecycle::Stable => None,
            Lifecycle::Preview => Some(self.preview_dist_tag.clone()),
            Lifecycle::Pr => pr_number.map(|n| format!("pr-{n}")),
        }
    }
}

/// Preflight check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Refuse to release from a dirty working tree.
    pub require_clean: bool,
    /// Command verifying registry credentials, if any.
    pub auth_command: Option<String>,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            require_clean: true,
            auth_command: None,
        }
    }
}

impl ReleaseConfig {
    /// Load `monorel.toml` from `root`, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No release configuration, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded release configuration");
        Ok(config)
    }

    /// Check the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.git.remote.trim().is_empty() {
            return Err(Error::config(
                "git.remote must not be empty",
                "Set [git] remote = \"origin\" in monorel.toml",
            ));
        }
        if self.plan.path.as_os_str().is_empty() {
            return Err(Error::config(
                "plan.path must not be empty",
                "Remove the setting to use .monorel/plan.json",
            ));
        }
        if self.workflow.initial_backoff_ms > self.workflow.max_backoff_ms {
            return Err(Error::config(
                "workflow.initial_backoff_ms exceeds workflow.max_backoff_ms",
                "Lower initial_backoff_ms or raise max_backoff_ms",
            ));
        }
        if self.publish.command.trim().is_empty() {
            return Err(Error::config(
                "publish.command must not be empty",
                "Provide a publish command such as \"cargo publish --package {name}\"",
            ));
        }
        Ok(())
    }

    /// Absolute plan path under `root`.
    #[must_use]
    pub fn plan_path(&self, root: &Path) -> PathBuf {
        root.join(&self.plan.path)
    }

    /// Absolute node-state database path under `root`.
    #[must_use]
    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.workflow.state_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_release_config_default() {
        let config = ReleaseConfig::default();
        assert_eq!(config.git.remote, "origin");
        assert_eq!(config.git.default_branch, "main");
        assert_eq!(config.plan.path, PathBuf::from(".monorel/plan.json"));
        assert_eq!(config.workflow.max_parallel, 0);
        assert_eq!(config.workflow.initial_backoff_ms, 500);
        assert!(config.preflight.require_clean);
        assert!(config.publish.check_manifest_version);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ReleaseConfig::load(dir.path()).unwrap();
        assert_eq!(config, ReleaseConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[git]
remote = "upstream"

[workflow]
max_parallel = 2

[publish]
registry = "internal"
check_manifest_version = false
"#,
        )
        .unwrap();
        let config = ReleaseConfig::load(dir.path()).unwrap();
        assert_eq!(config.git.remote, "upstream");
        assert_eq!(config.git.default_branch, "main");
        assert_eq!(config.workflow.max_parallel, 2);
        assert_eq!(config.workflow.max_backoff_ms, 10_000);
        assert_eq!(config.publish.registry.as_deref(), Some("internal"));
        assert_eq!(config.publish.preview_dist_tag, "next");
        assert!(!config.publish.check_manifest_version);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[git]\nremote = \"\"\n").unwrap();
        assert!(matches!(
            ReleaseConfig::load(dir.path()),
            Err(Error::Config { .. })
        ));

        std::fs::write(dir.path().join(CONFIG_FILE), "[git\n").unwrap();
        assert!(matches!(
            ReleaseConfig::load(dir.path()),
            Err(Error::TomlParse(_))
        ));
    }

    #[test]
    fn test_dist_tags() {
        let publish = PublishConfig::default();
        assert_eq!(publish.dist_tag(Lifecycle::Stable, None), None);
        assert_eq!(
            publish.dist_tag(Lifecycle::Preview, None).as_deref(),
            Some("next")
        );
        assert_eq!(
            publish.dist_tag(Lifecycle::Pr, Some(42)).as_deref(),
            Some("pr-42")
        );
    }

    #[test]
    fn test_paths_are_rooted() {
        let config = ReleaseConfig::default();
        let root = Path::new("/repo");
        assert_eq!(config.plan_path(root), PathBuf::from("/repo/.monorel/plan.json"));
        assert_eq!(
            config.state_path(root),
            PathBuf::from("/repo/.monorel/workflow.db")
        );
    }
}
