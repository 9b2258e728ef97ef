//! Workflow execution report.

use crate::node::{NodeKind, node_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// What happened to a node in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Ran and succeeded.
    Completed {
        /// Attempts used.
        attempts: u32,
    },
    /// Completed by an earlier run of the same workflow.
    AlreadyComplete,
    /// Logged without side effects.
    DryRun,
    /// Exhausted its attempts.
    Failed {
        /// Attempts used.
        attempts: u32,
        /// Last error.
        error: String,
    },
    /// Not run because a dependency failed.
    Blocked {
        /// The failed node.
        by: String,
    },
}

impl NodeOutcome {
    /// Whether the node's effect is in place.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::AlreadyComplete)
    }
}

/// Lifecycle state of one release item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Nothing happened yet.
    Pending,
    /// Published to the registry.
    Published,
    /// Tag created locally.
    Tagged,
    /// Tag pushed.
    Pushed,
    /// External release record in place.
    Released,
    /// A stage failed.
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Tagged => "tagged",
            Self::Pushed => "pushed",
            Self::Released => "released",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl ItemState {
    /// State reached once a stage of `kind` is done.
    #[must_use]
    pub const fn after(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Preflight => Self::Pending,
            NodeKind::Publish => Self::Published,
            NodeKind::CreateTag => Self::Tagged,
            NodeKind::PushTag => Self::Pushed,
            NodeKind::CreateExternalRelease => Self::Released,
        }
    }
}

/// Per-item summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    /// Package moniker.
    pub package: String,
    /// Tag of the release.
    pub tag: String,
    /// State reached.
    pub state: ItemState,
}

/// Result of executing a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// Plan content hash.
    pub workflow_id: String,
    /// Id of this run.
    pub run_id: Uuid,
    /// Whether side effects were suppressed.
    pub dry_run: bool,
    /// Outcome per node id.
    pub nodes: BTreeMap<String, NodeOutcome>,
    /// Per-item state, in plan order.
    pub items: Vec<ItemReport>,
}

impl WorkflowReport {
    /// Whether no node failed or was blocked.
    #[must_use]
    pub fn success(&self) -> bool {
        self.nodes
            .values()
            .all(|o| !matches!(o, NodeOutcome::Failed { .. } | NodeOutcome::Blocked { .. }))
    }

    /// Outcome of a node.
    #[must_use]
    pub fn outcome(&self, node: &str) -> Option<&NodeOutcome> {
        self.nodes.get(node)
    }

    /// Report for an item.
    #[must_use]
    pub fn item(&self, package: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.package == package)
    }

    /// Derive an item's state from its node outcomes.
    #[must_use]
    pub fn item_state(nodes: &BTreeMap<String, NodeOutcome>, package: &str) -> ItemState {
        let mut state = ItemState::Pending;
        for kind in NodeKind::ITEM_STAGES {
            match nodes.get(&node_id(kind, package)) {
                Some(NodeOutcome::Failed { .. }) => return ItemState::Failed,
                Some(outcome) if outcome.is_done() => state = ItemState::after(kind),
                _ => break,
            }
        }
        state
    }
}
