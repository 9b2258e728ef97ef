//! `monorel plan`

use super::{column_width, short_id};
use crate::cli::PlanArgs;
use crate::errors::{CliError, Result};
use monorel_release::{
    Lifecycle, MonotonicValidator, Plan, PlanInput, PlanOptions, Planner, PrContext,
    ProcessEnvironment, ReleaseConfig, TagIndex, VersionControl, Violation, Workspace,
    detect_pr_number,
};
use monorel_vcs::{CommitCollector, ConventionalClassifier, GitCli};
use std::fmt::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Compute the plan, check it against the tag history and save it.
///
/// Returns the text to print.
#[instrument(name = "plan_command", skip_all, fields(root = %root.display()))]
pub async fn execute(root: &Path, args: &PlanArgs, json: bool) -> Result<String> {
    let config = ReleaseConfig::load(root)?;
    let workspace = Workspace::scan(root)?;
    let git = GitCli::new(root);

    let tags = git.tags().await?;
    let index = TagIndex::from_tags(&tags);
    let classifier = ConventionalClassifier::new();
    let commits = CommitCollector::new(&git, &classifier)
        .collect(&workspace.packages, &index)
        .await?;

    let lifecycle = Lifecycle::from(args.lifecycle);
    let mut options = PlanOptions::new();
    if !args.packages.is_empty() {
        options = options.with_packages(&args.packages);
    }
    if lifecycle == Lifecycle::Pr
        && let Some(number) = args.pr.or_else(|| detect_pr_number(&ProcessEnvironment))
    {
        options = options.with_pr(PrContext::new(number, git.head_sha().await?));
    }

    let plan = Planner::plan(
        lifecycle,
        PlanInput {
            packages: &workspace.packages,
            commits: &commits,
            tags: &tags,
            graph: &workspace.graph,
        },
        &options,
    )?;

    // PR builds are all pinned at 0.0.0 and never ordered against history.
    if lifecycle != Lifecycle::Pr {
        let violations = check_monotonic(&git, &plan, &tags).await?;
        if !violations.is_empty() && !args.allow_violations {
            return Err(violations_error(&violations));
        }
    }

    let path = config.plan_path(root);
    plan.save(&path)?;
    let workflow_id = plan.workflow_id()?;
    info!(path = %path.display(), workflow_id = %workflow_id, "Plan written");

    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&plan)?));
    }
    Ok(render_plan(&plan, &workflow_id, &config.plan.path))
}

/// Monotonic violations of every planned version at `HEAD`.
async fn check_monotonic(git: &GitCli, plan: &Plan, tags: &[String]) -> Result<Vec<Violation>> {
    if plan.is_empty() {
        return Ok(Vec::new());
    }
    let head = git.head_sha().await?;
    let validator = MonotonicValidator::new(git);
    let mut violations = Vec::new();
    for item in plan.items() {
        violations.extend(
            validator
                .validate_adjacent(&head, &item.package, &item.next_version, tags)
                .await?,
        );
    }
    Ok(violations)
}

fn violations_error(violations: &[Violation]) -> CliError {
    let mut help = String::new();
    for violation in violations {
        let _ = writeln!(help, "{}", violation.message);
    }
    help.push_str("Pass --allow-violations to write the plan anyway");
    CliError::violations(violations.len(), Some(help))
}

/// Human-readable plan summary.
pub fn render_plan(plan: &Plan, workflow_id: &str, path: &Path) -> String {
    if plan.is_empty() {
        return format!(
            "Nothing to release ({} lifecycle).\nPlan written to {}\n",
            plan.lifecycle,
            path.display()
        );
    }

    let mut output = String::new();
    let _ = writeln!(
        output,
        "Planned {} release of {} package(s), workflow {}\n",
        plan.lifecycle,
        plan.items().count(),
        short_id(workflow_id)
    );

    let width = column_width(plan.items().map(|i| i.package.as_str()));
    for item in plan.items() {
        let current = item
            .current_version
            .as_ref()
            .map_or_else(|| "(new)".to_string(), ToString::to_string);
        let reason = if item.is_cascade() {
            "dependency update".to_string()
        } else {
            format!("{} commit(s)", item.commits.len())
        };
        let _ = writeln!(
            output,
            "  {:<width$}  {} -> {}  ({}, {})",
            item.package, current, item.next_version, item.bump, reason
        );
    }

    let _ = writeln!(output, "\nPlan written to {}", path.display());
    output.push_str("Run 'monorel apply' to release.\n");
    output
}
