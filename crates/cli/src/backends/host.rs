use super::failure_reason;
use async_trait::async_trait;
use monorel_workflow::{Error, NewRelease, ReleaseHost, Result};
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

/// GitHub releases through the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GhReleaseHost {
    program: PathBuf,
    root: PathBuf,
}

impl GhReleaseHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("gh"),
            root: root.into(),
        }
    }

    /// Use another `gh`-compatible executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn gh(&self, tag: &str, args: &[&str]) -> Result<Output> {
        debug!(tag, ?args, "Running gh");
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| {
                Error::external_release(
                    tag,
                    format!("failed to run {}: {e}", self.program.display()),
                )
            })
    }

    async fn gh_checked(&self, tag: &str, args: &[&str]) -> Result<()> {
        let output = self.gh(tag, args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::external_release(tag, failure_reason(&output)))
        }
    }
}

#[async_trait]
impl ReleaseHost for GhReleaseHost {
    async fn release_exists(&self, tag: &str) -> Result<bool> {
        let output = self
            .gh(tag, &["release", "view", tag, "--json", "tagName"])
            .await?;
        if output.status.success() {
            return Ok(true);
        }
        let reason = failure_reason(&output);
        if reason.to_lowercase().contains("not found") {
            Ok(false)
        } else {
            Err(Error::external_release(tag, reason))
        }
    }

    async fn create_release(&self, release: &NewRelease) -> Result<()> {
        let mut args = vec![
            "release",
            "create",
            release.tag.as_str(),
            "--verify-tag",
            "--title",
            release.title.as_str(),
            "--notes",
            release.body.as_str(),
        ];
        if release.prerelease {
            args.push("--prerelease");
        }
        self.gh_checked(&release.tag, &args).await?;
        info!(tag = %release.tag, prerelease = release.prerelease, "Created release");
        Ok(())
    }

    async fn update_release(&self, tag: &str, body: &str) -> Result<()> {
        self.gh_checked(tag, &["release", "edit", tag, "--notes", body])
            .await?;
        info!(tag, "Updated release notes");
        Ok(())
    }
}
