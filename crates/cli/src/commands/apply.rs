//! `monorel apply`

use super::{column_width, load_plan, short_id};
use crate::backends::{CommandPublisher, GhReleaseHost, GitPreflight};
use crate::cli::ApplyArgs;
use crate::errors::Result;
use monorel_release::{ReleaseConfig, Workspace};
use monorel_vcs::GitCli;
use monorel_workflow::{
    Capabilities, ExecutorConfig, MemoryNodeStore, NodeOutcome, NodeStore, SqliteNodeStore,
    WorkflowExecutor, WorkflowReport,
};
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Overrides the `gh` executable used for release records.
const GH_ENV: &str = "MONOREL_GH";

/// Execute the saved plan.
#[instrument(
    name = "apply_command",
    skip_all,
    fields(root = %root.display(), dry_run = args.dry_run)
)]
pub async fn execute(root: &Path, args: &ApplyArgs) -> Result<WorkflowReport> {
    let (config, plan) = load_plan(root)?;
    let workspace = Workspace::scan(root)?;
    let git = GitCli::new(root);

    let mut host = GhReleaseHost::new(root);
    if let Some(program) = std::env::var_os(GH_ENV) {
        host = host.with_program(program);
    }

    let caps = Capabilities {
        vcs: Arc::new(git.clone()),
        host: Arc::new(host),
        publisher: Arc::new(
            CommandPublisher::new(config.publish.command.clone(), root, &workspace.packages)
                .with_manifest_check(config.publish.check_manifest_version),
        ),
        preflight: Arc::new(
            GitPreflight::new(git, config.preflight.clone())
                .with_ignored([config.plan_path(root), config.state_path(root)]),
        ),
        store: open_store(root, &config, args.dry_run)?,
    };

    let mut executor_config =
        ExecutorConfig::from_release_config(&config).with_dry_run(args.dry_run);
    if let Some(max) = args.max_parallel {
        executor_config = executor_config.with_max_parallel(max);
    }

    let report = WorkflowExecutor::new(executor_config, caps)
        .execute(&plan)
        .await?;
    Ok(report)
}

/// The persistent store, or an in-memory one for dry runs without state.
///
/// Dry runs still read existing state so they show what a real run would
/// skip.
fn open_store(root: &Path, config: &ReleaseConfig, dry_run: bool) -> Result<Arc<dyn NodeStore>> {
    let path = config.state_path(root);
    if dry_run && !path.exists() {
        debug!(path = %path.display(), "No workflow state, dry run uses memory store");
        return Ok(Arc::new(MemoryNodeStore::new()));
    }
    Ok(Arc::new(SqliteNodeStore::open(&path)?))
}

/// Nodes that failed or were blocked.
pub fn unfinished(report: &WorkflowReport) -> usize {
    report
        .nodes
        .values()
        .filter(|o| matches!(o, NodeOutcome::Failed { .. } | NodeOutcome::Blocked { .. }))
        .count()
}

/// Human-readable execution report.
pub fn render_report(report: &WorkflowReport) -> String {
    let mut output = String::new();
    let _ = write!(
        output,
        "Workflow {} (run {})",
        short_id(&report.workflow_id),
        report.run_id
    );
    if report.dry_run {
        output.push_str(" [dry run]");
    }
    output.push_str("\n\n");

    if report.items.is_empty() {
        output.push_str("  Nothing to release.\n");
    }
    let package_width = column_width(report.items.iter().map(|i| i.package.as_str()));
    let tag_width = column_width(report.items.iter().map(|i| i.tag.as_str()));
    for item in &report.items {
        let _ = writeln!(
            output,
            "  {:<package_width$}  {:<tag_width$}  {}",
            item.package, item.tag, item.state
        );
    }

    let problems: Vec<String> = report
        .nodes
        .iter()
        .filter_map(|(node, outcome)| match outcome {
            NodeOutcome::Failed { attempts, error } => Some(format!(
                "  {node} failed after {attempts} attempt(s): {error}"
            )),
            NodeOutcome::Blocked { by } => Some(format!("  {node} blocked by {by}")),
            _ => None,
        })
        .collect();
    if !problems.is_empty() {
        output.push_str("\nProblems:\n");
        for problem in problems {
            output.push_str(&problem);
            output.push('\n');
        }
    }

    if report.dry_run {
        output.push_str("\nDry run: nothing was published, tagged or pushed.\n");
    }
    output
}
