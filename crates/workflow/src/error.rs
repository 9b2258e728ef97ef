//! Error types for workflow execution.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while executing a release workflow.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The preflight gate rejected the run.
    #[error("Preflight check failed: {message}")]
    #[diagnostic(
        code(monorel::workflow::preflight),
        help("Fix the reported problem and re-run 'monorel apply'; nothing was published")
    )]
    Preflight {
        /// Why preflight failed
        message: String,
    },

    /// Publishing a package failed.
    #[error("Failed to publish {package}: {message}")]
    #[diagnostic(
        code(monorel::workflow::publish),
        help("Re-run 'monorel apply' to retry; completed packages are not published again")
    )]
    Publish {
        /// The package being published
        package: String,
        /// The error message
        message: String,
    },

    /// Creating or pushing a tag failed.
    #[error("Tag operation failed for {tag}: {message}")]
    #[diagnostic(
        code(monorel::workflow::tag),
        help("Check repository permissions and that the remote is reachable")
    )]
    Tag {
        /// The tag name
        tag: String,
        /// The error message
        message: String,
    },

    /// Creating or updating the external release record failed.
    #[error("External release failed for {tag}: {message}")]
    #[diagnostic(
        code(monorel::workflow::external_release),
        help("Check release host credentials (e.g. run 'gh auth status')")
    )]
    ExternalRelease {
        /// The tag the release is attached to
        tag: String,
        /// The error message
        message: String,
    },

    /// The workflow graph is malformed.
    #[error("Invalid workflow graph: {message}")]
    #[diagnostic(code(monorel::workflow::graph))]
    Graph {
        /// The error message
        message: String,
    },

    /// Node-state persistence failed.
    #[error("Workflow state error: {message}")]
    #[diagnostic(
        code(monorel::workflow::store),
        help("The state database may be locked by another 'monorel apply' or corrupted")
    )]
    Store {
        /// The error message
        message: String,
    },

    /// Wrapped SQLite error.
    #[error("SQLite error: {0}")]
    #[diagnostic(code(monorel::workflow::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    /// Release planning error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Release(#[from] monorel_release::Error),
}

impl Error {
    /// Create a new preflight error.
    #[must_use]
    pub fn preflight(message: impl Into<String>) -> Self {
        Self::Preflight {
            message: message.into(),
        }
    }

    /// Create a new publish error.
    #[must_use]
    pub fn publish(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Create a new tag error.
    #[must_use]
    pub fn tag(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create a new external release error.
    #[must_use]
    pub fn external_release(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalRelease {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create a new graph error.
    #[must_use]
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            message: message.into(),
        }
    }

    /// Create a new store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
