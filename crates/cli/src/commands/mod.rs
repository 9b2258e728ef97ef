pub mod apply;
pub mod audit;
pub mod plan;
pub mod status;

use monorel_release::{Plan, ReleaseConfig};
use std::path::Path;

/// Repository configuration and the saved plan.
fn load_plan(root: &Path) -> monorel_release::Result<(ReleaseConfig, Plan)> {
    let config = ReleaseConfig::load(root)?;
    let plan = Plan::load(&config.plan_path(root))?;
    Ok((config, plan))
}

/// Abbreviated workflow id for human output.
fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Width of the widest value, for column alignment.
fn column_width<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.map(str::len).max().unwrap_or(0)
}
