//! `monorel status`

use super::{column_width, load_plan, short_id};
use crate::errors::Result;
use monorel_release::Plan;
use monorel_workflow::{
    NodeOutcome, NodeRecord, NodeStatus, NodeStore, SqliteNodeStore, WorkflowReport,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    workflow_id: &'a str,
    records: &'a [NodeRecord],
}

/// Recorded state of the saved plan's workflow.
#[instrument(name = "status_command", skip_all, fields(root = %root.display()))]
pub fn execute(root: &Path, json: bool) -> Result<String> {
    let (config, plan) = load_plan(root)?;
    let workflow_id = plan.workflow_id()?;
    let path = config.state_path(root);
    let records = if path.exists() {
        SqliteNodeStore::open(&path)?.list(&workflow_id)?
    } else {
        Vec::new()
    };

    if json {
        let report = StatusReport {
            workflow_id: &workflow_id,
            records: &records,
        };
        return Ok(format!("{}\n", serde_json::to_string_pretty(&report)?));
    }
    Ok(render_status(&plan, &workflow_id, &records))
}

fn outcome(record: &NodeRecord) -> NodeOutcome {
    match record.status {
        NodeStatus::Complete => NodeOutcome::Completed {
            attempts: record.attempts,
        },
        NodeStatus::Failed => NodeOutcome::Failed {
            attempts: record.attempts,
            error: record.error.clone().unwrap_or_default(),
        },
    }
}

/// Per-item states derived from the records, followed by the records.
pub fn render_status(plan: &Plan, workflow_id: &str, records: &[NodeRecord]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Workflow {} ({} lifecycle, {} item(s))\n",
        short_id(workflow_id),
        plan.lifecycle,
        plan.items().count()
    );

    let nodes: BTreeMap<String, NodeOutcome> = records
        .iter()
        .map(|r| (r.node.clone(), outcome(r)))
        .collect();
    let width = column_width(plan.items().map(|i| i.package.as_str()));
    for item in plan.items() {
        let state = WorkflowReport::item_state(&nodes, &item.package);
        let _ = writeln!(
            output,
            "  {:<width$}  {}  {}",
            item.package,
            item.tag_name(),
            state
        );
    }

    if records.is_empty() {
        output.push_str("\nNo recorded runs. Run 'monorel apply' to start.\n");
        return output;
    }

    output.push_str("\nSteps:\n");
    let node_width = column_width(records.iter().map(|r| r.node.as_str()));
    for record in records {
        let _ = write!(
            output,
            "  {:<node_width$}  {:<8}  attempts={}  {}",
            record.node,
            record.status.to_string(),
            record.attempts,
            record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(error) = &record.error {
            let _ = write!(output, "  {error}");
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use monorel_release::{BumpType, ItemLifecycle, Lifecycle, ReleaseItem, Version};
    use uuid::Uuid;

    fn plan() -> Plan {
        Plan {
            lifecycle: Lifecycle::Stable,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            releases: vec![ReleaseItem {
                package: "core".to_string(),
                scope: "core".to_string(),
                bump: BumpType::Minor,
                current_version: Some(Version::new(1, 0, 0)),
                next_version: Version::new(1, 1, 0),
                target_version: Version::new(1, 1, 0),
                commits: vec![],
                lifecycle: ItemLifecycle::Stable,
            }],
            cascades: vec![],
        }
    }

    #[test]
    fn test_status_without_records() {
        let output = render_status(&plan(), "0123456789abcdef", &[]);
        assert!(output.contains("  core  core@1.1.0  pending"));
        assert!(output.contains("No recorded runs"));
    }

    #[test]
    fn test_status_with_records() {
        let run = Uuid::new_v4();
        let records = vec![
            NodeRecord::complete("wf", "preflight", run, 1),
            NodeRecord::complete("wf", "publish:core", run, 2),
            NodeRecord::failed("wf", "tag:core", run, 3, "tag exists on another commit"),
        ];
        let output = render_status(&plan(), "wf", &records);
        assert!(output.contains("  core  core@1.1.0  failed"));
        assert!(output.contains("publish:core  complete  attempts=2"));
        assert!(output.contains("tag exists on another commit"));
    }

    #[test]
    fn test_status_progress() {
        let run = Uuid::new_v4();
        let records = vec![
            NodeRecord::complete("wf", "publish:core", run, 1),
            NodeRecord::complete("wf", "tag:core", run, 1),
        ];
        let output = render_status(&plan(), "wf", &records);
        assert!(output.contains("  core  core@1.1.0  tagged"));
    }
}
