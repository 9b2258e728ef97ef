//! Persistence of per-node workflow state.
//!
//! Completed nodes are recorded under the plan's workflow id so that a
//! re-run of the same plan skips them.

mod sqlite;

pub use sqlite::SqliteNodeStore;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// Persisted status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// The node's side effect happened.
    Complete,
    /// The node exhausted its attempts.
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for NodeStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(Error::store(format!("unknown node status '{other}'"))),
        }
    }
}

/// Stored state of one node of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Workflow (plan content hash) the node belongs to.
    pub workflow_id: String,
    /// Node id.
    pub node: String,
    /// Outcome.
    pub status: NodeStatus,
    /// Attempts used by the run that wrote this record.
    pub attempts: u32,
    /// Last error, for failed nodes.
    pub error: Option<String>,
    /// Run that wrote this record.
    pub run_id: Uuid,
    /// When the record was written.
    pub updated_at: DateTime<Utc>,
}

impl NodeRecord {
    /// A record for a node that completed.
    #[must_use]
    pub fn complete(workflow_id: &str, node: &str, run_id: Uuid, attempts: u32) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            node: node.to_string(),
            status: NodeStatus::Complete,
            attempts,
            error: None,
            run_id,
            updated_at: Utc::now(),
        }
    }

    /// A record for a node that failed.
    #[must_use]
    pub fn failed(
        workflow_id: &str,
        node: &str,
        run_id: Uuid,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: NodeStatus::Failed,
            error: Some(error.into()),
            ..Self::complete(workflow_id, node, run_id, attempts)
        }
    }
}

/// Durable node-state storage.
pub trait NodeStore: Send + Sync {
    /// Record for one node, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, workflow_id: &str, node: &str) -> Result<Option<NodeRecord>>;

    /// Insert or replace a node record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put(&self, record: &NodeRecord) -> Result<()>;

    /// All records of a workflow, ordered by node id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self, workflow_id: &str) -> Result<Vec<NodeRecord>>;

    /// Ids of completed nodes of a workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn completed(&self, workflow_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .list(workflow_id)?
            .into_iter()
            .filter(|r| r.status == NodeStatus::Complete)
            .map(|r| r.node)
            .collect())
    }
}

/// Process-local store, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    records: Mutex<BTreeMap<(String, String), NodeRecord>>,
}

impl MemoryNodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), NodeRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::store("node store lock poisoned"))
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, workflow_id: &str, node: &str) -> Result<Option<NodeRecord>> {
        Ok(self
            .lock()?
            .get(&(workflow_id.to_string(), node.to_string()))
            .cloned())
    }

    fn put(&self, record: &NodeRecord) -> Result<()> {
        self.lock()?.insert(
            (record.workflow_id.clone(), record.node.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn list(&self, workflow_id: &str) -> Result<Vec<NodeRecord>> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}
