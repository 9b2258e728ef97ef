//! Version control through the `git` command line.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monorel_release::{Error, Result, VersionControl};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, trace};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%B%x1e";

/// A commit as read from `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    /// Full commit hash.
    pub hash: String,
    /// Author name.
    pub author: String,
    /// Author date.
    pub date: DateTime<Utc>,
    /// Full commit message.
    pub message: String,
}

/// [`VersionControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Operate on the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        trace!(?args, "Running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| Error::git(format!("failed to run git {}: {e}", args.join(" "))))
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        Ok(self.run_untrimmed(args).await?.trim().to_string())
    }

    async fn run_untrimmed(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Non-merge commits in `range` (or all of `HEAD`) touching `path`, newest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if `git log` fails or prints malformed records.
    pub async fn log(&self, range: Option<&str>, path: Option<&Path>) -> Result<Vec<RawCommit>> {
        let range = range.unwrap_or("HEAD");
        let path_arg = path.map(|p| p.to_string_lossy().into_owned());
        let mut args = vec!["log", "--no-merges", LOG_FORMAT, range];
        if let Some(path) = &path_arg {
            args.push("--");
            args.push(path);
        }
        let stdout = self.run(&args).await?;
        parse_log(&stdout)
    }

    /// Whether the working tree has no uncommitted changes.
    ///
    /// # Errors
    ///
    /// Returns an error if `git status` fails.
    pub async fn is_clean(&self) -> Result<bool> {
        Ok(self.changed_paths().await?.is_empty())
    }

    /// Paths with uncommitted changes, relative to the repository root.
    ///
    /// Untracked directories are expanded to the files they contain; renames
    /// report the new path.
    ///
    /// # Errors
    ///
    /// Returns an error if `git status` fails.
    pub async fn changed_paths(&self) -> Result<Vec<String>> {
        let stdout = self
            .run_untrimmed(&["status", "--porcelain", "--untracked-files=all"])
            .await?;
        Ok(parse_status(&stdout))
    }
}

/// Paths of `git status --porcelain` lines (`XY path` or `XY old -> new`).
fn parse_status(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.get(3..))
        .filter_map(|path| path.rsplit(" -> ").next())
        .map(|path| path.trim_matches('"').to_string())
        .collect()
}

fn parse_log(stdout: &str) -> Result<Vec<RawCommit>> {
    stdout
        .split(RECORD_SEP)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let (Some(hash), Some(author), Some(date), Some(message)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::git(format!("malformed git log record: {record}")));
            };
            let date = DateTime::parse_from_rfc3339(date)
                .map_err(|e| Error::git(format!("invalid commit date '{date}': {e}")))?
                .with_timezone(&Utc);
            Ok(RawCommit {
                hash: hash.to_string(),
                author: author.to_string(),
                date,
                message: message.trim().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl VersionControl for GitCli {
    async fn tags(&self) -> Result<Vec<String>> {
        let stdout = self.run(&["tag", "--list"]).await?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    async fn tag_sha(&self, tag: &str) -> Result<String> {
        self.run(&["rev-list", "-n", "1", tag]).await
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self
            .output(&["merge-base", "--is-ancestor", ancestor, descendant])
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::git(format!(
                "git merge-base --is-ancestor {ancestor} {descendant} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn head_sha(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    async fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        self.run(&["tag", "-a", name, "-m", message]).await?;
        debug!(tag = name, "Created tag");
        Ok(())
    }

    async fn push_tag(&self, name: &str, remote: &str, is_preview: bool) -> Result<()> {
        let refspec = format!("refs/tags/{name}");
        let mut args = vec!["push"];
        if is_preview {
            args.push("--force");
        }
        args.push(remote);
        args.push(&refspec);
        self.run(&args).await?;
        debug!(tag = name, remote, "Pushed tag");
        Ok(())
    }

    async fn tag_exists(&self, name: &str) -> Result<bool> {
        let stdout = self.run(&["tag", "--list", name]).await?;
        Ok(!stdout.is_empty())
    }
}
