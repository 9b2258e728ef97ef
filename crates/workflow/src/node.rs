//! Workflow nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the global preflight node.
pub const PREFLIGHT_ID: &str = "preflight";

/// The operation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Global gate before any side effect.
    Preflight,
    /// Publish the package to its registry.
    Publish,
    /// Create the release tag locally.
    CreateTag,
    /// Push the release tag to the remote.
    PushTag,
    /// Create or update the external release record.
    CreateExternalRelease,
}

impl NodeKind {
    /// Per-item stages, in execution order.
    pub const ITEM_STAGES: [Self; 4] = [
        Self::Publish,
        Self::CreateTag,
        Self::PushTag,
        Self::CreateExternalRelease,
    ];

    /// Node id prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Preflight => PREFLIGHT_ID,
            Self::Publish => "publish",
            Self::CreateTag => "tag",
            Self::PushTag => "push",
            Self::CreateExternalRelease => "release",
        }
    }

    /// Retry policy applied to nodes of this kind.
    ///
    /// Tagging is local and preflight failures are fatal, so neither retries.
    #[must_use]
    pub const fn retry_policy(self) -> RetryPolicy {
        match self {
            Self::Publish | Self::PushTag | Self::CreateExternalRelease => RetryPolicy::STANDARD,
            Self::Preflight | Self::CreateTag => RetryPolicy::NONE,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preflight => write!(f, "preflight"),
            Self::Publish => write!(f, "publish"),
            Self::CreateTag => write!(f, "create tag"),
            Self::PushTag => write!(f, "push tag"),
            Self::CreateExternalRelease => write!(f, "create release"),
        }
    }
}

/// How often a failed node is re-attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// No retries.
    pub const NONE: Self = Self { max_retries: 0 };
    /// Two retries after the first attempt.
    pub const STANDARD: Self = Self { max_retries: 2 };

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(self) -> u32 {
        self.max_retries + 1
    }
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique node id (`preflight`, `publish:<pkg>`, ...).
    pub id: String,
    /// Operation to perform.
    pub kind: NodeKind,
    /// Package the node belongs to; `None` for preflight.
    pub package: Option<String>,
    /// Ids of nodes that must complete first.
    pub dependencies: Vec<String>,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl Node {
    /// The global preflight node.
    #[must_use]
    pub fn preflight() -> Self {
        Self {
            id: PREFLIGHT_ID.to_string(),
            kind: NodeKind::Preflight,
            package: None,
            dependencies: Vec::new(),
            retry: NodeKind::Preflight.retry_policy(),
        }
    }

    /// A per-item node depending on `dependency`.
    #[must_use]
    pub fn for_item(kind: NodeKind, package: &str, dependency: impl Into<String>) -> Self {
        Self {
            id: node_id(kind, package),
            kind,
            package: Some(package.to_string()),
            dependencies: vec![dependency.into()],
            retry: kind.retry_policy(),
        }
    }
}

/// Node id of `kind` for `package`.
#[must_use]
pub fn node_id(kind: NodeKind, package: &str) -> String {
    match kind {
        NodeKind::Preflight => PREFLIGHT_ID.to_string(),
        _ => format!("{}:{package}", kind.prefix()),
    }
}
