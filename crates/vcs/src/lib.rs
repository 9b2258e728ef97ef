//! Git integration for monorel.
//!
//! - [`GitCli`] implements [`VersionControl`](monorel_release::VersionControl)
//!   on top of the `git` binary.
//! - [`ConventionalClassifier`] turns commit messages into classifications.
//! - [`CommitCollector`] reads each package's commits since its last stable
//!   tag and classifies them.

pub mod classify;
pub mod collect;
pub mod git;

pub use classify::ConventionalClassifier;
pub use collect::CommitCollector;
pub use git::{GitCli, RawCommit};
