//! Executor behavior against in-memory collaborators.

mod support;

use monorel_release::{ItemLifecycle, Lifecycle, Version};
use monorel_workflow::{
    Error, ExecutorConfig, ItemState, NodeOutcome, NodeStatus, NodeStore, RetryConfig,
    SqliteNodeStore, WorkflowExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use support::{Harness, RejectingStore, plan, stable_item};
use tempfile::TempDir;

fn config() -> ExecutorConfig {
    ExecutorConfig::new()
        .with_max_parallel(4)
        .with_retry(RetryConfig::immediate())
}

#[tokio::test]
async fn releases_every_item() {
    let harness = Harness::new();
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    assert_eq!(report.nodes.len(), 9);
    assert_eq!(report.item("core").unwrap().state, ItemState::Released);
    assert_eq!(report.item("cli").unwrap().state, ItemState::Released);
    assert_eq!(report.item("core").unwrap().tag, "core@1.1.0");

    let release = harness.host.release("core@1.1.0").unwrap();
    assert_eq!(release.title, "core v1.1.0");
    assert!(release.body.contains("### Features"));
    assert!(release.body.contains("add core feature"));
    assert!(!release.prerelease);

    let pushed = harness.vcs.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 2);
    assert!(pushed.iter().all(|(_, preview)| !preview));
}

#[tokio::test]
async fn stages_run_in_order() {
    let harness = Harness::new();
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());
    executor.execute(&plan).await.unwrap();

    let events = &harness.events;
    assert_eq!(events.all()[0], "preflight");
    assert_eq!(events.count("preflight"), 1);
    for (package, tag) in [("core", "core@1.1.0"), ("cli", "cli@0.3.0")] {
        let publish = events.position(&format!("publish:{package}"));
        let create = events.position(&format!("tag:{tag}"));
        let push = events.position(&format!("push:{tag}"));
        let release = events.position(&format!("release:{tag}"));
        assert!(publish < create);
        assert!(create < push);
        assert!(push < release);
    }
}

#[tokio::test]
async fn independent_items_run_concurrently() {
    let harness = Harness::new();
    harness.publisher.rendezvous(3);
    let plan = plan(
        Lifecycle::Stable,
        vec![
            stable_item("core", "1.1.0"),
            stable_item("cli", "0.3.0"),
            stable_item("fmt", "2.0.1"),
        ],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    // Publishes only return once all three are running at once.
    let report = tokio::time::timeout(Duration::from_secs(10), executor.execute(&plan))
        .await
        .expect("item chains were serialized")
        .unwrap();

    assert!(report.success());
    assert_eq!(harness.publisher.peak_concurrency(), 3);
}

#[tokio::test]
async fn publish_is_retried() {
    let harness = Harness::new();
    harness.publisher.failures.set("core", 2);
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    assert_eq!(
        report.outcome("publish:core"),
        Some(&NodeOutcome::Completed { attempts: 3 })
    );
    assert_eq!(harness.publisher.calls("core"), 3);
}

#[tokio::test]
async fn failed_item_does_not_block_siblings() {
    let harness = Harness::new();
    harness.publisher.failures.set("core", usize::MAX);
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(!report.success());
    assert!(matches!(
        report.outcome("publish:core"),
        Some(NodeOutcome::Failed { attempts: 3, .. })
    ));
    for blocked in ["tag:core", "push:core", "release:core"] {
        assert_eq!(
            report.outcome(blocked),
            Some(&NodeOutcome::Blocked {
                by: "publish:core".to_string()
            })
        );
    }
    assert_eq!(report.item("core").unwrap().state, ItemState::Failed);
    assert_eq!(report.item("cli").unwrap().state, ItemState::Released);
    assert_eq!(harness.events.count("tag:core@1.1.0"), 0);
}

#[tokio::test]
async fn unsaved_node_state_fails_only_its_item() {
    let harness = Harness::with_store(Arc::new(RejectingStore::new("publish:core")));
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    match report.outcome("publish:core") {
        Some(NodeOutcome::Failed { error, .. }) => assert!(error.contains("disk full")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(
        report.outcome("tag:core"),
        Some(&NodeOutcome::Blocked {
            by: "publish:core".to_string()
        })
    );
    assert_eq!(report.item("cli").unwrap().state, ItemState::Released);
}

#[tokio::test]
async fn panicking_node_fails_only_its_item() {
    let harness = Harness::new();
    *harness.publisher.panics_on.lock().unwrap() = Some("core".to_string());
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(matches!(
        report.outcome("publish:core"),
        Some(NodeOutcome::Failed { attempts: 1, .. })
    ));
    assert_eq!(report.item("core").unwrap().state, ItemState::Failed);
    assert_eq!(report.item("cli").unwrap().state, ItemState::Released);
    let failure = harness
        .store
        .get(&plan.workflow_id().unwrap(), "publish:core")
        .unwrap()
        .unwrap();
    assert_eq!(failure.status, NodeStatus::Failed);
}

#[tokio::test]
async fn push_is_retried_but_tag_is_created_once() {
    let harness = Harness::new();
    harness.vcs.push_failures.set("core@1.1.0", usize::MAX);
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert_eq!(harness.events.count("push:core@1.1.0"), 3);
    assert_eq!(harness.events.count("tag:core@1.1.0"), 1);
    assert_eq!(report.item("core").unwrap().state, ItemState::Failed);
}

#[tokio::test]
async fn resume_skips_completed_nodes() {
    let harness = Harness::new();
    harness.vcs.push_failures.set("core@1.1.0", usize::MAX);
    let plan = plan(
        Lifecycle::Stable,
        vec![stable_item("core", "1.1.0"), stable_item("cli", "0.3.0")],
    );
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let first = executor.execute(&plan).await.unwrap();
    assert!(!first.success());
    assert_eq!(first.item("core").unwrap().state, ItemState::Failed);

    harness.vcs.push_failures.clear();
    let second = executor.execute(&plan).await.unwrap();

    assert!(second.success());
    assert_eq!(second.workflow_id, first.workflow_id);
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(harness.publisher.calls("core"), 1);
    assert_eq!(harness.publisher.calls("cli"), 1);
    assert_eq!(harness.events.count("tag:core@1.1.0"), 1);
    assert_eq!(
        second.outcome("publish:core"),
        Some(&NodeOutcome::AlreadyComplete)
    );
    assert_eq!(
        second.outcome("release:cli"),
        Some(&NodeOutcome::AlreadyComplete)
    );
    assert_eq!(
        second.outcome("push:core"),
        Some(&NodeOutcome::Completed { attempts: 1 })
    );
    assert_eq!(second.item("core").unwrap().state, ItemState::Released);
}

#[tokio::test]
async fn resume_survives_reopening_the_state_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workflow.db");
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);

    let first = Harness::with_store(Arc::new(SqliteNodeStore::open(&path).unwrap()));
    first.vcs.push_failures.set("core@1.1.0", usize::MAX);
    let report = WorkflowExecutor::new(config(), first.capabilities())
        .execute(&plan)
        .await
        .unwrap();
    assert_eq!(report.item("core").unwrap().state, ItemState::Failed);

    let store = SqliteNodeStore::open(&path).unwrap();
    let workflow_id = plan.workflow_id().unwrap();
    let failed = store.get(&workflow_id, "push:core").unwrap().unwrap();
    assert_eq!(failed.status, NodeStatus::Failed);
    assert_eq!(failed.attempts, 3);

    let second = Harness::with_store(Arc::new(store));
    let report = WorkflowExecutor::new(config(), second.capabilities())
        .execute(&plan)
        .await
        .unwrap();
    assert!(report.success());
    assert_eq!(second.publisher.calls("core"), 0);
    assert_eq!(second.events.count("preflight"), 0);
    assert_eq!(second.events.count("push:core@1.1.0"), 1);
}

#[tokio::test]
async fn dry_run_has_no_side_effects() {
    let harness = Harness::new();
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config().with_dry_run(true), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.dry_run);
    assert!(report.success());
    assert_eq!(report.nodes.len(), 5);
    assert!(report.nodes.values().all(|o| *o == NodeOutcome::DryRun));
    assert_eq!(report.item("core").unwrap().state, ItemState::Pending);
    assert!(harness.events.all().is_empty());
    assert!(harness.store.list(&report.workflow_id).unwrap().is_empty());
}

#[tokio::test]
async fn preflight_failure_aborts_before_side_effects() {
    let harness = Harness::new();
    *harness.preflight.reject.lock().unwrap() = Some("working tree is dirty".to_string());
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let err = executor.execute(&plan).await.unwrap_err();

    assert!(matches!(err, Error::Preflight { .. }));
    assert!(err.to_string().contains("working tree is dirty"));
    assert_eq!(harness.events.all(), vec!["preflight".to_string()]);
}

#[tokio::test]
async fn preview_release_is_updated_in_place() {
    let harness = Harness::new();
    let mut item = stable_item("core", "1.1.0-next.2");
    item.lifecycle = ItemLifecycle::Preview { iteration: 2 };
    harness.host.seed("core@1.1.0-next.2", "old notes");
    let plan = plan(Lifecycle::Preview, vec![item]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    let updates = harness.host.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "core@1.1.0-next.2");
    assert!(updates[0].1.contains("add core feature"));
    assert_eq!(harness.events.count("release:core@1.1.0-next.2"), 0);

    let pushed = harness.vcs.pushed.lock().unwrap().clone();
    assert_eq!(pushed, vec![("core@1.1.0-next.2".to_string(), true)]);

    let published = harness.publisher.published.lock().unwrap().clone();
    assert_eq!(published[0].2.dist_tag.as_deref(), Some("next"));
}

#[tokio::test]
async fn existing_stable_release_is_left_alone() {
    let harness = Harness::new();
    harness.host.seed("core@1.1.0", "published by hand");
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    assert!(harness.host.updates.lock().unwrap().is_empty());
    assert_eq!(
        harness.host.release("core@1.1.0").unwrap().body,
        "published by hand"
    );
}

#[tokio::test]
async fn existing_tag_is_not_recreated() {
    let harness = Harness::new();
    harness
        .vcs
        .tags
        .lock()
        .unwrap()
        .push("core@1.1.0".to_string());
    let plan = plan(Lifecycle::Stable, vec![stable_item("core", "1.1.0")]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    assert_eq!(harness.events.count("tag:core@1.1.0"), 0);
    assert_eq!(harness.events.count("push:core@1.1.0"), 1);
}

#[tokio::test]
async fn pull_request_builds_publish_under_pr_dist_tag() {
    let harness = Harness::new();
    let mut item = stable_item("core", "0.0.0-pr.42.1.abcdef0");
    item.lifecycle = ItemLifecycle::PullRequest {
        pr_number: 42,
        iteration: 1,
        sha: "abcdef0123456".to_string(),
    };
    item.target_version = Version::new(1, 1, 0);
    let plan = plan(Lifecycle::Pr, vec![item]);
    let executor = WorkflowExecutor::new(config(), harness.capabilities());

    executor.execute(&plan).await.unwrap();

    let published = harness.publisher.published.lock().unwrap().clone();
    assert_eq!(published[0].2.dist_tag.as_deref(), Some("pr-42"));
    let release = harness.host.release("core@0.0.0-pr.42.1.abcdef0").unwrap();
    assert!(release.prerelease);
    let pushed = harness.vcs.pushed.lock().unwrap().clone();
    assert!(!pushed[0].1);
}

#[tokio::test]
async fn single_slot_still_completes() {
    let harness = Harness::new();
    let plan = plan(
        Lifecycle::Stable,
        vec![
            stable_item("a", "1.0.0"),
            stable_item("b", "1.0.0"),
            stable_item("c", "1.0.0"),
        ],
    );
    let executor = WorkflowExecutor::new(config().with_max_parallel(1), harness.capabilities());

    let report = executor.execute(&plan).await.unwrap();

    assert!(report.success());
    assert!(
        report
            .items
            .iter()
            .all(|item| item.state == ItemState::Released)
    );
}
