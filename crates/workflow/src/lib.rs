//! Resumable execution of release plans.
//!
//! A [`Plan`](monorel_release::Plan) becomes a [`WorkflowGraph`]: one global
//! preflight node followed by a `publish -> tag -> push -> release` chain per
//! item. The [`WorkflowExecutor`] runs ready nodes concurrently, retries the
//! network-bound ones with exponential backoff, and persists every outcome in
//! a [`NodeStore`] so that re-applying the same plan resumes where the last
//! run stopped.
//!
//! # Example
//!
//! ```rust,ignore
//! use monorel_workflow::{Capabilities, ExecutorConfig, SqliteNodeStore, WorkflowExecutor};
//!
//! let store = Arc::new(SqliteNodeStore::open(&config.state_path(root))?);
//! let executor = WorkflowExecutor::new(
//!     ExecutorConfig::from_release_config(&config),
//!     Capabilities { vcs, host, publisher, preflight, store },
//! );
//! let report = executor.execute(&plan).await?;
//! ```

pub mod backends;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod notes;
pub mod report;
pub mod retry;
pub mod store;

pub use backends::{
    Capabilities, NewRelease, NoPreflight, Preflight, PublishOptions, Publisher, ReleaseHost,
};
pub use error::{Error, Result};
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use graph::{WorkflowGraph, WorkflowGraphBuilder};
pub use node::{Node, NodeKind, RetryPolicy};
pub use report::{ItemReport, ItemState, NodeOutcome, WorkflowReport};
pub use retry::RetryConfig;
pub use store::{MemoryNodeStore, NodeRecord, NodeStatus, NodeStore, SqliteNodeStore};
