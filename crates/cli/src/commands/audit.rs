//! `monorel audit`

use crate::cli::AuditArgs;
use crate::errors::Result;
use monorel_release::{Error, MonotonicValidator, VersionControl, Violation, Workspace};
use monorel_vcs::GitCli;
use std::fmt::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Audit every pair of existing tags of the selected packages.
#[instrument(name = "audit_command", skip_all, fields(root = %root.display()))]
pub async fn execute(root: &Path, args: &AuditArgs) -> Result<Vec<Violation>> {
    let workspace = Workspace::scan(root)?;
    let packages: Vec<&str> = if args.packages.is_empty() {
        workspace.packages.iter().map(|p| p.name.as_str()).collect()
    } else {
        if let Some(unknown) = args
            .packages
            .iter()
            .find(|name| workspace.package(name).is_none())
        {
            return Err(Error::package_not_found(unknown.clone()).into());
        }
        args.packages.iter().map(String::as_str).collect()
    };

    let git = GitCli::new(root);
    let tags = git.tags().await?;
    let validator = MonotonicValidator::new(&git);
    let mut violations = Vec::new();
    for package in &packages {
        violations.extend(validator.audit(package, &tags).await?);
    }
    info!(
        packages = packages.len(),
        violations = violations.len(),
        "Audit finished"
    );
    Ok(violations)
}

/// Human-readable audit result.
pub fn render_violations(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "No monotonic version violations found.\n".to_string();
    }
    let mut output = String::new();
    for violation in violations {
        let _ = writeln!(
            output,
            "  {}@{}: {}",
            violation.package, violation.version, violation.message
        );
    }
    output
}
