//! Classified commits.
//!
//! Raw commit messages are parsed by a [`CommitClassifier`] into a
//! [`Classification`]; this module only models the parsed shapes and the
//! bump each one contributes.

use crate::error::Result;
use crate::version::{BumpType, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Conventional commit type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommitType {
    /// `feat`
    Feat,
    /// `fix`
    Fix,
    /// `docs`
    Docs,
    /// `perf`
    Perf,
    /// `style`
    Style,
    /// `refactor`
    Refactor,
    /// `test`
    Test,
    /// `build`
    Build,
    /// `ci`
    Ci,
    /// `chore`
    Chore,
    /// `revert`
    Revert,
    /// Any other type, kept verbatim.
    Other(String),
}

impl CommitType {
    /// The bump this type contributes on its own.
    #[must_use]
    pub const fn bump(&self) -> BumpType {
        match self {
            Self::Feat => BumpType::Minor,
            Self::Fix | Self::Docs | Self::Perf => BumpType::Patch,
            _ => BumpType::None,
        }
    }

    /// String form of the type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Perf => "perf",
            Self::Style => "style",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Build => "build",
            Self::Ci => "ci",
            Self::Chore => "chore",
            Self::Revert => "revert",
            Self::Other(other) => other.as_str(),
        }
    }
}

impl FromStr for CommitType {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "feat" | "feature" => Self::Feat,
            "fix" => Self::Fix,
            "docs" => Self::Docs,
            "perf" => Self::Perf,
            "style" => Self::Style,
            "refactor" => Self::Refactor,
            "test" | "tests" => Self::Test,
            "build" => Self::Build,
            "ci" => Self::Ci,
            "chore" => Self::Chore,
            "revert" => Self::Revert,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for CommitType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<CommitType> for String {
    fn from(value: CommitType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bump contributed by a commit of `commit_type`.
#[must_use]
pub const fn bump_for(commit_type: &CommitType, breaking: bool) -> BumpType {
    if breaking {
        BumpType::Major
    } else {
        commit_type.bump()
    }
}

/// One scope addressed by a multi-scope commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTarget {
    /// Commit type for this scope.
    #[serde(rename = "type")]
    pub commit_type: CommitType,
    /// Targeted scope.
    pub scope: String,
    /// Whether the change is breaking for this scope.
    pub breaking: bool,
}

/// The parsed shape of a commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// One header applying to every listed scope.
    Single {
        /// Commit type.
        #[serde(rename = "type")]
        commit_type: CommitType,
        /// Scopes in the header (may be empty).
        scopes: Vec<String>,
        /// Whether the change is breaking.
        breaking: bool,
        /// Description line.
        message: String,
    },
    /// Several headers, each aimed at one scope.
    Multi {
        /// Per-scope headers.
        targets: Vec<ScopeTarget>,
        /// Overall description.
        message: String,
        /// Per-scope description sections.
        per_scope_sections: BTreeMap<String, String>,
    },
    /// Synthetic commit explaining a cascade release.
    Cascade {
        /// Releasing dependency that triggered the cascade.
        dependency: String,
        /// Version the dependency releases as.
        version: Version,
    },
}

/// A commit in a package's history since its last release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCommit {
    /// Commit hash.
    pub hash: String,
    /// Commit author.
    pub author: String,
    /// Commit date.
    pub date: DateTime<Utc>,
    /// Parsed message.
    pub classification: Classification,
}

/// A commit projected onto one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedCommit {
    /// Commit hash.
    pub hash: String,
    /// Commit type for the scope.
    pub commit_type: CommitType,
    /// Description line.
    pub description: String,
    /// Whether the change is breaking for the scope.
    pub breaking: bool,
}

impl ScopedCommit {
    /// Bump contributed by this commit.
    #[must_use]
    pub const fn bump(&self) -> BumpType {
        bump_for(&self.commit_type, self.breaking)
    }
}

impl ReleaseCommit {
    /// Synthetic commit recording that `dependency` releases as `version`.
    #[must_use]
    pub fn cascade(dependency: impl Into<String>, version: Version, date: DateTime<Utc>) -> Self {
        Self {
            hash: String::new(),
            author: String::new(),
            date,
            classification: Classification::Cascade {
                dependency: dependency.into(),
                version,
            },
        }
    }

    /// Whether this is a synthetic cascade commit.
    #[must_use]
    pub const fn is_cascade(&self) -> bool {
        matches!(self.classification, Classification::Cascade { .. })
    }

    /// Project this commit onto `scope`.
    ///
    /// Single commits ignore `scope`. Multi commits fall back to a
    /// non-breaking `chore` when `scope` has no header of its own.
    #[must_use]
    pub fn for_scope(&self, scope: &str) -> ScopedCommit {
        let (commit_type, description, breaking) = match &self.classification {
            Classification::Single {
                commit_type,
                breaking,
                message,
                ..
            } => (commit_type.clone(), message.clone(), *breaking),
            Classification::Multi {
                targets,
                message,
                per_scope_sections,
            } => {
                let description = per_scope_sections
                    .get(scope)
                    .cloned()
                    .unwrap_or_else(|| message.clone());
                targets.iter().find(|t| t.scope == scope).map_or_else(
                    || (CommitType::Chore, description.clone(), false),
                    |t| (t.commit_type.clone(), description.clone(), t.breaking),
                )
            }
            Classification::Cascade {
                dependency,
                version,
            } => (
                CommitType::Chore,
                format!("update dependency {dependency} to {version}"),
                false,
            ),
        };
        ScopedCommit {
            hash: self.hash.clone(),
            commit_type,
            description,
            breaking,
        }
    }

    /// Bump this commit contributes to `scope`.
    #[must_use]
    pub fn bump_for_scope(&self, scope: &str) -> BumpType {
        self.for_scope(scope).bump()
    }
}

/// Parses raw commit messages into [`Classification`]s.
pub trait CommitClassifier: Send + Sync {
    /// Classify a raw commit message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Classification`] when the message has no
    /// recognizable structure at all.
    fn classify(&self, hash: &str, raw_message: &str) -> Result<Classification>;
}
