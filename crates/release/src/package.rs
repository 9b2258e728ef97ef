//! Workspace packages.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A releasable package in the workspace.
///
/// Identity is the `name` (moniker); two packages with the same name are the
/// same package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Full package moniker (scoped or unscoped).
    pub name: String,
    /// Short name derived from the package directory.
    pub scope: String,
    /// Absolute package directory.
    pub path: PathBuf,
}

impl Package {
    /// Create a package, deriving its scope from the directory name.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let path = path.into();
        let scope = Self::scope_for(&name, &path);
        Self { name, scope, path }
    }

    /// Create a package with an explicit scope.
    #[must_use]
    pub fn with_scope(
        name: impl Into<String>,
        scope: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            path: path.into(),
        }
    }

    fn scope_for(name: &str, path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| name.rsplit('/').next().unwrap_or(name).to_string())
    }
}
