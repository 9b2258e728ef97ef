//! CLI error type and exit codes.

use miette::Diagnostic;
use thiserror::Error;

/// Successful exit
pub const EXIT_OK: i32 = 0;
/// The command ran but its outcome is a failure (failed nodes, violations)
pub const EXIT_FAILED: i32 = 1;
/// CLI, configuration or environment error
pub const EXIT_CLI: i32 = 2;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Release(#[from] monorel_release::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Workflow(#[from] monorel_workflow::Error),

    #[error("Release workflow {workflow_id} did not complete: {failed} step(s) failed or blocked")]
    #[diagnostic(
        code(monorel::cli::incomplete),
        help("Fix the reported problems and run 'monorel apply' again to resume")
    )]
    Incomplete { workflow_id: String, failed: usize },

    #[error("Found {count} monotonic version violation(s)")]
    #[diagnostic(code(monorel::cli::violations))]
    Violations {
        count: usize,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to write output: {0}")]
    #[diagnostic(code(monorel::cli::output))]
    Output(#[from] serde_json::Error),
}

impl CliError {
    #[must_use]
    pub fn incomplete(workflow_id: impl Into<String>, failed: usize) -> Self {
        Self::Incomplete {
            workflow_id: workflow_id.into(),
            failed,
        }
    }

    #[must_use]
    pub const fn violations(count: usize, help: Option<String>) -> Self {
        Self::Violations { count, help }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for an error.
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Incomplete { .. } | CliError::Violations { .. } => EXIT_FAILED,
        CliError::Release(_) | CliError::Workflow(_) | CliError::Output(_) => EXIT_CLI,
    }
}
