use super::{failure_reason, shell};
use async_trait::async_trait;
use monorel_release::PreflightConfig;
use monorel_vcs::GitCli;
use monorel_workflow::{Error, Preflight, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Changed paths listed in the dirty-tree error.
const MAX_LISTED_CHANGES: usize = 3;

/// Checks the working tree and registry credentials before any side effect.
#[derive(Debug, Clone)]
pub struct GitPreflight {
    git: GitCli,
    config: PreflightConfig,
    ignored: Vec<String>,
}

impl GitPreflight {
    pub const fn new(git: GitCli, config: PreflightConfig) -> Self {
        Self {
            git,
            config,
            ignored: Vec::new(),
        }
    }

    /// Files monorel writes itself (plan, node state). Changes to them, or
    /// to files sharing their prefix such as SQLite `-wal` files, do not
    /// make the tree dirty.
    pub fn with_ignored(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let root = self.git.root().to_path_buf();
        self.ignored = paths
            .into_iter()
            .map(|path| relative_to(&root, &path))
            .collect();
        self
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignored.iter().any(|prefix| path.starts_with(prefix))
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy();
    relative.trim_start_matches("./").to_string()
}

#[async_trait]
impl Preflight for GitPreflight {
    async fn check(&self) -> Result<()> {
        if self.config.require_clean {
            let changed: Vec<String> = self
                .git
                .changed_paths()
                .await
                .map_err(|e| Error::preflight(e.to_string()))?
                .into_iter()
                .filter(|path| !self.is_ignored(path))
                .collect();
            if !changed.is_empty() {
                let mut listed = changed[..changed.len().min(MAX_LISTED_CHANGES)].join(", ");
                if changed.len() > MAX_LISTED_CHANGES {
                    listed.push_str(", ...");
                }
                return Err(Error::preflight(format!(
                    "working tree has uncommitted changes ({listed}); \
                     set preflight.require_clean = false to allow"
                )));
            }
        }

        if let Some(command) = &self.config.auth_command {
            let output = shell(command, self.git.root())
                .await
                .map_err(|e| Error::preflight(format!("failed to run '{command}': {e}")))?;
            if !output.status.success() {
                return Err(Error::preflight(format!(
                    "'{command}' failed: {}",
                    failure_reason(&output)
                )));
            }
        }

        debug!("Preflight passed");
        Ok(())
    }
}
