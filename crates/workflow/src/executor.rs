//! Workflow execution engine.
//!
//! Runs a [`WorkflowGraph`] with bounded parallelism. Nodes are spawned as
//! soon as their dependencies are done, so independent item chains proceed
//! concurrently while the stages of one item stay sequential. Every
//! non-dry-run outcome is written to the [`NodeStore`](crate::store::NodeStore)
//! keyed by `(workflow_id, node)`; completed nodes are skipped on the next
//! run of the same plan.

use crate::backends::{Capabilities, NewRelease, PublishOptions};
use crate::error::{Error, Result};
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeKind};
use crate::notes;
use crate::report::{ItemReport, NodeOutcome, WorkflowReport};
use crate::retry::{RetryConfig, retry_with_backoff};
use crate::store::NodeRecord;
use monorel_release::{ItemLifecycle, Lifecycle, Plan, PublishConfig, ReleaseConfig, ReleaseItem};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for the workflow executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum concurrently running nodes (0 = available parallelism).
    pub max_parallel: usize,
    /// Log every node instead of running it.
    pub dry_run: bool,
    /// Remote tags are pushed to.
    pub remote: String,
    /// Backoff between attempts.
    pub retry: RetryConfig,
    /// Registry and dist-tag settings.
    pub publish: PublishConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            dry_run: false,
            remote: "origin".to_string(),
            retry: RetryConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive executor settings from `monorel.toml`.
    #[must_use]
    pub fn from_release_config(config: &ReleaseConfig) -> Self {
        Self {
            max_parallel: config.workflow.max_parallel,
            dry_run: false,
            remote: config.git.remote.clone(),
            retry: RetryConfig::from(&config.workflow),
            publish: config.publish.clone(),
        }
    }

    /// Set maximum parallel nodes.
    #[must_use]
    pub const fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// Enable dry run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the push remote.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Set retry backoff.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get effective parallelism level.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        } else {
            self.max_parallel
        }
    }
}

/// State shared by the node tasks of one run.
struct RunContext {
    config: ExecutorConfig,
    caps: Capabilities,
    workflow_id: String,
    run_id: Uuid,
    items: HashMap<String, ReleaseItem>,
}

/// Executes release plans.
#[derive(Debug)]
pub struct WorkflowExecutor {
    config: ExecutorConfig,
    caps: Capabilities,
}

impl WorkflowExecutor {
    /// Create an executor.
    #[must_use]
    pub const fn new(config: ExecutorConfig, caps: Capabilities) -> Self {
        Self { config, caps }
    }

    /// Executor configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `plan`, resuming any earlier run of the same plan.
    ///
    /// Failed nodes block only their own item's later stages; the run
    /// carries on with every other item and reports the failure.
    ///
    /// A node whose state cannot be saved, or whose task panics, is reported
    /// as failed like any other node failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be turned into a graph, if stored
    /// state cannot be read, or if preflight fails.
    #[tracing::instrument(
        name = "workflow_execute",
        skip_all,
        fields(
            lifecycle = %plan.lifecycle,
            items = plan.items().count(),
            dry_run = self.config.dry_run
        )
    )]
    pub async fn execute(&self, plan: &Plan) -> Result<WorkflowReport> {
        let workflow_id = plan.workflow_id()?;
        let graph = WorkflowGraph::from_plan(plan)?;
        let run_id = Uuid::new_v4();
        info!(%workflow_id, %run_id, nodes = graph.len(), "Starting workflow");

        let mut outcomes: BTreeMap<String, NodeOutcome> = BTreeMap::new();
        let mut done: HashSet<String> = HashSet::new();
        // Nodes that must not be scheduled again: in flight, failed or blocked.
        let mut settled: HashSet<String> = HashSet::new();

        for id in self.caps.store.completed(&workflow_id)? {
            if graph.node(&id).is_some() {
                debug!(node = %id, "Node already complete");
                outcomes.insert(id.clone(), NodeOutcome::AlreadyComplete);
                done.insert(id);
            }
        }

        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            caps: self.caps.clone(),
            workflow_id: workflow_id.clone(),
            run_id,
            items: plan
                .items()
                .map(|item| (item.package.clone(), item.clone()))
                .collect(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.effective_parallelism()));
        let mut join_set = JoinSet::new();
        let mut running: HashMap<Id, Node> = HashMap::new();

        loop {
            for node in graph.ready(&done, &settled) {
                settled.insert(node.id.clone());
                let task_node = node.clone();
                let ctx = Arc::clone(&ctx);
                let semaphore = Arc::clone(&semaphore);
                let handle = join_set.spawn(async move {
                    let _permit = semaphore.acquire().await;
                    ctx.run(&task_node).await
                });
                running.insert(handle.id(), node.clone());
            }

            let Some(joined) = join_set.join_next_with_id().await else {
                break;
            };
            let (node, outcome) = match joined {
                Ok((id, outcome)) => match running.remove(&id) {
                    Some(node) => (node, outcome),
                    None => continue,
                },
                Err(join_error) => {
                    let Some(node) = running.remove(&join_error.id()) else {
                        continue;
                    };
                    let outcome = ctx.task_failed(&node, &join_error.to_string());
                    (node, outcome)
                }
            };

            match &outcome {
                NodeOutcome::Failed { error, .. } if node.kind == NodeKind::Preflight => {
                    error!(error = %error, "Preflight failed, aborting workflow");
                    return Err(Error::preflight(error.clone()));
                }
                NodeOutcome::Failed { error, attempts } => {
                    error!(node = %node.id, attempts, error = %error, "Node failed");
                    for blocked in graph.dependents_of(&node.id) {
                        warn!(node = %blocked, by = %node.id, "Node blocked by failed dependency");
                        settled.insert(blocked.clone());
                        outcomes.insert(
                            blocked,
                            NodeOutcome::Blocked {
                                by: node.id.clone(),
                            },
                        );
                    }
                }
                _ => {
                    done.insert(node.id.clone());
                }
            }
            outcomes.insert(node.id, outcome);
        }

        let items = plan
            .items()
            .map(|item| ItemReport {
                package: item.package.clone(),
                tag: item.tag_name(),
                state: WorkflowReport::item_state(&outcomes, &item.package),
            })
            .collect();
        let report = WorkflowReport {
            workflow_id,
            run_id,
            dry_run: self.config.dry_run,
            nodes: outcomes,
            items,
        };
        info!(success = report.success(), "Workflow finished");
        Ok(report)
    }
}

impl RunContext {
    /// Run one node with retries and persist its outcome.
    async fn run(&self, node: &Node) -> NodeOutcome {
        if self.config.dry_run {
            info!(node = %node.id, "[dry-run] would {}", self.describe(node));
            return NodeOutcome::DryRun;
        }

        debug!(node = %node.id, "Running node");
        let attempted =
            retry_with_backoff(&self.config.retry, node.retry, &node.id, move || {
                self.perform(node)
            })
            .await;
        let attempts = attempted.attempts;

        match attempted.result {
            Ok(()) => {
                info!(node = %node.id, attempts, "Node completed");
                let record =
                    NodeRecord::complete(&self.workflow_id, &node.id, self.run_id, attempts);
                match self.caps.store.put(&record) {
                    Ok(()) => NodeOutcome::Completed { attempts },
                    Err(e) => {
                        error!(node = %node.id, error = %e, "Failed to save node state");
                        NodeOutcome::Failed {
                            attempts,
                            error: format!("completed but state was not saved: {e}"),
                        }
                    }
                }
            }
            Err(e) => self.record_failure(node, attempts, e.to_string()),
        }
    }

    /// Outcome for a node whose task panicked or was cancelled.
    fn task_failed(&self, node: &Node, reason: &str) -> NodeOutcome {
        error!(node = %node.id, reason, "Node task failed");
        let message = format!("node task failed: {reason}");
        if self.config.dry_run {
            return NodeOutcome::Failed {
                attempts: 1,
                error: message,
            };
        }
        self.record_failure(node, 1, message)
    }

    fn record_failure(&self, node: &Node, attempts: u32, message: String) -> NodeOutcome {
        let record = NodeRecord::failed(
            &self.workflow_id,
            &node.id,
            self.run_id,
            attempts,
            &message,
        );
        if let Err(e) = self.caps.store.put(&record) {
            warn!(node = %node.id, error = %e, "Failed to save node failure");
        }
        NodeOutcome::Failed {
            attempts,
            error: message,
        }
    }

    fn item(&self, node: &Node) -> Result<&ReleaseItem> {
        node.package
            .as_ref()
            .and_then(|package| self.items.get(package))
            .ok_or_else(|| Error::graph(format!("node '{}' has no release item", node.id)))
    }

    fn describe(&self, node: &Node) -> String {
        let Ok(item) = self.item(node) else {
            return "run preflight checks".to_string();
        };
        let tag = item.tag_name();
        match node.kind {
            NodeKind::Preflight => "run preflight checks".to_string(),
            NodeKind::Publish => format!("publish {} {}", item.package, item.next_version),
            NodeKind::CreateTag => format!("create tag {tag}"),
            NodeKind::PushTag => format!("push tag {tag} to {}", self.config.remote),
            NodeKind::CreateExternalRelease => format!("create release {tag}"),
        }
    }

    fn publish_options(&self, item: &ReleaseItem) -> PublishOptions {
        let pr_number = match &item.lifecycle {
            ItemLifecycle::PullRequest { pr_number, .. } => Some(*pr_number),
            _ => None,
        };
        PublishOptions {
            dist_tag: self
                .config
                .publish
                .dist_tag(item.lifecycle.lifecycle(), pr_number),
            registry: self.config.publish.registry.clone(),
        }
    }

    async fn perform(&self, node: &Node) -> Result<()> {
        if node.kind == NodeKind::Preflight {
            return self.caps.preflight.check().await;
        }
        let item = self.item(node)?;
        let tag = item.tag_name();
        let is_preview = item.lifecycle.lifecycle() == Lifecycle::Preview;

        match node.kind {
            NodeKind::Preflight => Ok(()),
            NodeKind::Publish => {
                self.caps
                    .publisher
                    .publish(&item.package, &item.next_version, &self.publish_options(item))
                    .await
            }
            NodeKind::CreateTag => {
                if self.caps.vcs.tag_exists(&tag).await? {
                    debug!(%tag, "Tag already exists");
                    return Ok(());
                }
                self.caps
                    .vcs
                    .create_tag(&tag, &format!("Release {tag}"))
                    .await
                    .map_err(|e| Error::tag(&tag, e.to_string()))
            }
            NodeKind::PushTag => self
                .caps
                .vcs
                .push_tag(&tag, &self.config.remote, is_preview)
                .await
                .map_err(|e| Error::tag(&tag, e.to_string())),
            NodeKind::CreateExternalRelease => {
                let body = notes::render(item);
                if self.caps.host.release_exists(&tag).await? {
                    if is_preview {
                        debug!(%tag, "Updating rolling preview release");
                        return self.caps.host.update_release(&tag, &body).await;
                    }
                    debug!(%tag, "Release already exists");
                    return Ok(());
                }
                self.caps
                    .host
                    .create_release(&NewRelease {
                        title: notes::release_title(item),
                        tag,
                        body,
                        prerelease: item.is_prerelease(),
                    })
                    .await
            }
        }
    }
}
