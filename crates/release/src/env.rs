//! Pull request detection from CI environment variables.

use std::collections::HashMap;

/// Environment variable lookup.
pub trait Environment {
    /// Value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Variables holding a bare PR number, in lookup order.
const PR_NUMBER_VARS: &[&str] = &["MONOREL_PR_NUMBER", "PR_NUMBER", "CI_MERGE_REQUEST_IID"];

/// Detect the pull request number of the current CI run.
///
/// Explicit variables win over `GITHUB_REF` (`refs/pull/<n>/merge`).
#[must_use]
pub fn detect_pr_number(env: &dyn Environment) -> Option<u64> {
    let explicit = PR_NUMBER_VARS
        .iter()
        .filter_map(|key| env.var(key))
        .find_map(|value| value.trim().parse().ok());
    explicit.or_else(|| {
        env.var("GITHUB_REF").and_then(|reference| {
            reference
                .strip_prefix("refs/pull/")
                .and_then(|rest| rest.split('/').next())
                .and_then(|n| n.parse().ok())
        })
    })
}
