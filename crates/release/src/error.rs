//! Error types for release planning.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release planning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning a release.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A version string is not valid semver.
    #[error("Invalid version: {version}")]
    #[diagnostic(
        code(monorel::release::invalid_version),
        help("Version must follow semantic versioning (e.g., 1.0.0, 2.1.0-next.1)")
    )]
    InvalidVersion {
        /// The invalid version string
        version: String,
    },

    /// A tag does not have the `<moniker>@<version>` shape.
    #[error("Invalid release tag: {tag}")]
    #[diagnostic(
        code(monorel::release::invalid_tag),
        help("Release tags are formatted as <package>@<version>, e.g. @scope/pkg@1.2.3")
    )]
    InvalidTag {
        /// The offending tag
        tag: String,
    },

    /// A commit could not be classified at all.
    #[error("Cannot classify commit {hash}: {message}")]
    #[diagnostic(
        code(monorel::release::classification),
        help("Commit messages must follow the conventional commit format")
    )]
    Classification {
        /// The commit hash
        hash: String,
        /// Why classification failed
        message: String,
    },

    /// The workspace dependency graph contains a cycle.
    #[error("Dependency cycle detected between packages: {packages}")]
    #[diagnostic(
        code(monorel::release::cyclic_dependency),
        help("Workspace packages must form a DAG; remove one of the dependency edges")
    )]
    CyclicDependency {
        /// Packages that participate in the cycle
        packages: String,
    },

    /// Package not found in the workspace.
    #[error("Package not found: {name}")]
    #[diagnostic(
        code(monorel::release::package_not_found),
        help("Ensure the package exists in the workspace and is properly configured")
    )]
    PackageNotFound {
        /// The package name that wasn't found
        name: String,
    },

    /// A PR lifecycle plan was requested without a PR number or commit.
    #[error("Missing pull request context: {message}")]
    #[diagnostic(
        code(monorel::release::pr_context),
        help("Pass --pr <number> or run inside a CI job for a pull request")
    )]
    MissingPrContext {
        /// What was missing
        message: String,
    },

    /// Configuration error.
    #[error("Release configuration error: {message}")]
    #[diagnostic(code(monorel::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Manifest file error (Cargo.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(
        code(monorel::release::manifest),
        help("Check that the manifest file exists and is properly formatted")
    )]
    Manifest {
        /// The error message
        message: String,
        /// The manifest file path
        path: Option<PathBuf>,
    },

    /// Reading or writing the persisted plan failed.
    #[error("Plan I/O error: {message}")]
    #[diagnostic(
        code(monorel::release::plan_io),
        help("Run 'monorel plan' to produce a plan before applying it")
    )]
    PlanIo {
        /// The error message
        message: String,
        /// The plan path
        path: Option<PathBuf>,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(monorel::release::git),
        help("Ensure you are in a git repository and have the necessary permissions")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(monorel::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(monorel::release::json))]
    Json(#[from] serde_json::Error),

    /// Wrapped TOML parsing error.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(monorel::release::toml_parse))]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a new invalid tag error.
    #[must_use]
    pub fn invalid_tag(tag: impl Into<String>) -> Self {
        Self::InvalidTag { tag: tag.into() }
    }

    /// Create a new classification error.
    #[must_use]
    pub fn classification(hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Classification {
            hash: hash.into(),
            message: message.into(),
        }
    }

    /// Create a new cyclic dependency error.
    #[must_use]
    pub fn cyclic_dependency<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let packages: Vec<String> = packages
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        Self::CyclicDependency {
            packages: packages.join(", "),
        }
    }

    /// Create a new package not found error.
    #[must_use]
    pub fn package_not_found(name: impl Into<String>) -> Self {
        Self::PackageNotFound { name: name.into() }
    }

    /// Create a new missing PR context error.
    #[must_use]
    pub fn missing_pr_context(message: impl Into<String>) -> Self {
        Self::MissingPrContext {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new manifest error.
    #[must_use]
    pub fn manifest(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Manifest {
            message: message.into(),
            path,
        }
    }

    /// Create a new plan I/O error with source.
    #[must_use]
    pub fn plan_io(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::PlanIo {
            message: message.into(),
            path,
            source,
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_version_error() {
        let err = Error::invalid_version("not-a-version");
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn test_invalid_tag_error() {
        let err = Error::invalid_tag("pkg-1.0.0");
        assert!(err.to_string().contains("Invalid release tag"));
        assert!(err.to_string().contains("pkg-1.0.0"));
    }

    #[test]
    fn test_classification_error() {
        let err = Error::classification("abc123", "empty message");
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("empty message"));
    }

    #[test]
    fn test_cyclic_dependency_lists_packages() {
        let err = Error::cyclic_dependency(["a", "b"]);
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_package_not_found_error() {
        let err = Error::package_not_found("missing-pkg");
        assert!(err.to_string().contains("missing-pkg"));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("bad config", "check your settings");
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_plan_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::plan_io(
            "failed to read plan",
            Some(PathBuf::from(".monorel/plan.json")),
            Some(io_err),
        );
        assert!(err.to_string().contains("Plan I/O error"));
    }

    #[test]
    fn test_git_error() {
        let err = Error::git("not a repository");
        assert!(err.to_string().contains("Git error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
