//! In-memory collaborators for executor tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monorel_release::{
    BumpType, Classification, CommitType, ItemLifecycle, Lifecycle, Plan, ReleaseCommit,
    ReleaseItem, Version, VersionControl,
};
use monorel_workflow::{
    Capabilities, Error, MemoryNodeStore, NewRelease, NodeRecord, NodeStore, Preflight,
    PublishOptions, Publisher, ReleaseHost, Result,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// Ordered log of side effects across all doubles.
#[derive(Debug, Default, Clone)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> usize {
        self.all()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event '{event}' not recorded"))
    }

    pub fn count(&self, event: &str) -> usize {
        self.all().iter().filter(|e| *e == event).count()
    }
}

/// Remaining forced failures per key; `usize::MAX` fails forever.
#[derive(Debug, Default)]
pub struct Failures(Mutex<HashMap<String, usize>>);

impl Failures {
    pub fn set(&self, key: &str, times: usize) {
        self.0.lock().unwrap().insert(key.to_string(), times);
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn take(&self, key: &str) -> bool {
        let mut map = self.0.lock().unwrap();
        match map.get_mut(key) {
            Some(0) | None => false,
            Some(n) => {
                if *n != usize::MAX {
                    *n -= 1;
                }
                true
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeVcs {
    pub events: Events,
    pub tags: Mutex<Vec<String>>,
    pub pushed: Mutex<Vec<(String, bool)>>,
    pub push_failures: Failures,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn tags(&self) -> monorel_release::Result<Vec<String>> {
        Ok(self.tags.lock().unwrap().clone())
    }

    async fn tag_sha(&self, tag: &str) -> monorel_release::Result<String> {
        Ok(format!("sha-{tag}"))
    }

    async fn is_ancestor(
        &self,
        _ancestor: &str,
        _descendant: &str,
    ) -> monorel_release::Result<bool> {
        Ok(true)
    }

    async fn head_sha(&self) -> monorel_release::Result<String> {
        Ok("head".to_string())
    }

    async fn current_branch(&self) -> monorel_release::Result<String> {
        Ok("main".to_string())
    }

    async fn create_tag(&self, name: &str, _message: &str) -> monorel_release::Result<()> {
        self.events.push(format!("tag:{name}"));
        self.tags.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn push_tag(
        &self,
        name: &str,
        _remote: &str,
        is_preview: bool,
    ) -> monorel_release::Result<()> {
        self.events.push(format!("push:{name}"));
        if self.push_failures.take(name) {
            return Err(monorel_release::Error::git("remote hung up"));
        }
        self.pushed
            .lock()
            .unwrap()
            .push((name.to_string(), is_preview));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakePublisher {
    pub events: Events,
    pub published: Mutex<Vec<(String, Version, PublishOptions)>>,
    pub failures: Failures,
    /// Package whose publish panics.
    pub panics_on: Mutex<Option<String>>,
    barrier: Mutex<Option<Arc<Barrier>>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakePublisher {
    pub fn calls(&self, package: &str) -> usize {
        self.events.count(&format!("publish:{package}"))
    }

    /// Make every publish wait until `parties` publishes are in flight.
    pub fn rendezvous(&self, parties: usize) {
        *self.barrier.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    /// Most publishes observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        package: &str,
        version: &Version,
        options: &PublishOptions,
    ) -> Result<()> {
        self.events.push(format!("publish:{package}"));
        if self.panics_on.lock().unwrap().as_deref() == Some(package) {
            panic!("publisher crashed on {package}");
        }
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let barrier = self.barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failures.take(package) {
            return Err(Error::publish(package, "registry unavailable"));
        }
        self.published
            .lock()
            .unwrap()
            .push((package.to_string(), version.clone(), options.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeHost {
    pub events: Events,
    pub releases: Mutex<BTreeMap<String, NewRelease>>,
    pub updates: Mutex<Vec<(String, String)>>,
}

impl FakeHost {
    pub fn seed(&self, tag: &str, body: &str) {
        self.releases.lock().unwrap().insert(
            tag.to_string(),
            NewRelease {
                tag: tag.to_string(),
                title: tag.to_string(),
                body: body.to_string(),
                prerelease: false,
            },
        );
    }

    pub fn release(&self, tag: &str) -> Option<NewRelease> {
        self.releases.lock().unwrap().get(tag).cloned()
    }
}

#[async_trait]
impl ReleaseHost for FakeHost {
    async fn release_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.releases.lock().unwrap().contains_key(tag))
    }

    async fn create_release(&self, release: &NewRelease) -> Result<()> {
        self.events.push(format!("release:{}", release.tag));
        self.releases
            .lock()
            .unwrap()
            .insert(release.tag.clone(), release.clone());
        Ok(())
    }

    async fn update_release(&self, tag: &str, body: &str) -> Result<()> {
        self.events.push(format!("update:{tag}"));
        self.updates
            .lock()
            .unwrap()
            .push((tag.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakePreflight {
    pub events: Events,
    pub reject: Mutex<Option<String>>,
}

#[async_trait]
impl Preflight for FakePreflight {
    async fn check(&self) -> Result<()> {
        self.events.push("preflight");
        match self.reject.lock().unwrap().clone() {
            Some(reason) => Err(Error::preflight(reason)),
            None => Ok(()),
        }
    }
}

/// Memory store that refuses to save one node.
#[derive(Debug, Default)]
pub struct RejectingStore {
    inner: MemoryNodeStore,
    pub rejected_node: String,
}

impl RejectingStore {
    pub fn new(rejected_node: &str) -> Self {
        Self {
            inner: MemoryNodeStore::new(),
            rejected_node: rejected_node.to_string(),
        }
    }
}

impl NodeStore for RejectingStore {
    fn get(&self, workflow_id: &str, node: &str) -> Result<Option<NodeRecord>> {
        self.inner.get(workflow_id, node)
    }

    fn put(&self, record: &NodeRecord) -> Result<()> {
        if record.node == self.rejected_node {
            return Err(Error::store("disk full"));
        }
        self.inner.put(record)
    }

    fn list(&self, workflow_id: &str) -> Result<Vec<NodeRecord>> {
        self.inner.list(workflow_id)
    }
}

/// A full set of doubles sharing one event log.
pub struct Harness {
    pub events: Events,
    pub vcs: Arc<FakeVcs>,
    pub publisher: Arc<FakePublisher>,
    pub host: Arc<FakeHost>,
    pub preflight: Arc<FakePreflight>,
    pub store: Arc<dyn NodeStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryNodeStore::new()))
    }

    pub fn with_store(store: Arc<dyn NodeStore>) -> Self {
        let events = Events::default();
        Self {
            vcs: Arc::new(FakeVcs {
                events: events.clone(),
                ..FakeVcs::default()
            }),
            publisher: Arc::new(FakePublisher {
                events: events.clone(),
                ..FakePublisher::default()
            }),
            host: Arc::new(FakeHost {
                events: events.clone(),
                ..FakeHost::default()
            }),
            preflight: Arc::new(FakePreflight {
                events: events.clone(),
                ..FakePreflight::default()
            }),
            events,
            store,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            vcs: self.vcs.clone(),
            host: self.host.clone(),
            publisher: self.publisher.clone(),
            preflight: self.preflight.clone(),
            store: self.store.clone(),
        }
    }
}

fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn feature(message: &str) -> ReleaseCommit {
    ReleaseCommit {
        hash: "0123456789abcdef".to_string(),
        author: "dev".to_string(),
        date: timestamp(),
        classification: Classification::Single {
            commit_type: CommitType::Feat,
            scopes: vec![],
            breaking: false,
            message: message.to_string(),
        },
    }
}

pub fn stable_item(package: &str, next: &str) -> ReleaseItem {
    let next_version: Version = next.parse().unwrap();
    ReleaseItem {
        package: package.to_string(),
        scope: package.to_string(),
        bump: BumpType::Minor,
        current_version: None,
        target_version: next_version.base(),
        next_version,
        commits: vec![feature(&format!("add {package} feature"))],
        lifecycle: ItemLifecycle::Stable,
    }
}

pub fn plan(lifecycle: Lifecycle, releases: Vec<ReleaseItem>) -> Plan {
    Plan {
        lifecycle,
        timestamp: timestamp(),
        releases,
        cascades: vec![],
    }
}
