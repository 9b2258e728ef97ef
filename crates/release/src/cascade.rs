//! Dependency graph and cascade detection.
//!
//! When a package releases, every package that depends on it (directly or
//! transitively) must release too so it picks up the new version.

use crate::commit::ReleaseCommit;
use crate::error::{Error, Result};
use crate::package::Package;
use crate::plan::ReleaseItem;
use crate::tag::TagIndex;
use crate::version::{BumpType, NextVersion, ReleaseMode, Version, VersionCalculator};
use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};

/// Reverse dependency adjacency: `package -> packages depending on it`.
///
/// An edge `A -> B` means `B` depends on `A`, so releasing `A` cascades to `B`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(package, dependencies)` pairs.
    pub fn from_dependencies<I, P, D, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::new();
        for (package, dependencies) in entries {
            let package = package.into();
            graph.add_package(package.clone());
            for dependency in dependencies {
                graph.add_dependency(package.clone(), dependency);
            }
        }
        graph
    }

    /// Register a package with no edges yet.
    pub fn add_package(&mut self, package: impl Into<String>) {
        self.dependents.entry(package.into()).or_default();
    }

    /// Record that `package` depends on `dependency`.
    pub fn add_dependency(&mut self, package: impl Into<String>, dependency: impl Into<String>) {
        let package = package.into();
        self.dependents.entry(package.clone()).or_default();
        self.dependents
            .entry(dependency.into())
            .or_default()
            .insert(package);
    }

    /// Packages that directly depend on `package`, sorted.
    pub fn dependents(&self, package: &str) -> impl Iterator<Item = &str> {
        self.dependents
            .get(package)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// All packages known to the graph.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.dependents.keys().map(String::as_str)
    }

    /// Number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(BTreeSet::len).sum()
    }

    /// Reject graphs with dependency cycles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] naming the packages that could not
    /// be ordered.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for name in self.packages() {
            indices.insert(name, graph.add_node(name));
        }
        for (dependency, dependents) in &self.dependents {
            let from = indices[dependency.as_str()];
            for dependent in dependents {
                graph.add_edge(from, indices[dependent.as_str()], ());
            }
        }

        if toposort(&graph, None).is_ok() {
            return Ok(());
        }

        // Peel off everything orderable; whatever remains sits on or behind a cycle.
        let mut in_degree: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|idx| {
                let degree = graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count();
                (idx, degree)
            })
            .collect();
        let mut ready: VecDeque<NodeIndex> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&idx, _)| idx)
            .collect();
        while let Some(idx) = ready.pop_front() {
            in_degree.remove(&idx);
            for next in graph.neighbors(idx) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }
        let mut remaining: Vec<&str> = in_degree.keys().map(|&idx| graph[idx]).collect();
        remaining.sort_unstable();
        Err(Error::cyclic_dependency(remaining))
    }
}

/// Finds packages that must release because a dependency releases.
pub struct CascadeDetector<'a> {
    graph: &'a DependencyGraph,
    tags: &'a TagIndex,
}

impl<'a> CascadeDetector<'a> {
    /// Create a detector over a dependency graph and the release tags.
    #[must_use]
    pub const fn new(graph: &'a DependencyGraph, tags: &'a TagIndex) -> Self {
        Self { graph, tags }
    }

    /// Breadth-first propagation from the direct releases.
    ///
    /// Each cascading package becomes a patch item of the same lifecycle,
    /// carrying one synthetic commit per releasing dependency that reached
    /// it. `packages` supplies scopes; `allowed` restricts which packages may
    /// cascade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] if the graph has a cycle.
    pub fn detect(
        &self,
        packages: &[Package],
        releases: &[ReleaseItem],
        mode: &ReleaseMode,
        timestamp: DateTime<Utc>,
        allowed: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ReleaseItem>> {
        self.graph.ensure_acyclic()?;

        let calculator = VersionCalculator::new(self.tags);
        let direct: BTreeSet<&str> = releases.iter().map(|r| r.package.as_str()).collect();
        let mut versions: HashMap<String, Version> = releases
            .iter()
            .map(|r| (r.package.clone(), r.next_version.clone()))
            .collect();

        let mut visited: BTreeSet<String> = direct.iter().map(|s| (*s).to_string()).collect();
        let mut queue: VecDeque<String> = releases.iter().map(|r| r.package.clone()).collect();
        let mut triggers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut planned: Vec<(String, Option<Version>, NextVersion)> = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dependent in self.graph.dependents(&current) {
                if direct.contains(dependent) {
                    continue;
                }
                if allowed.is_some_and(|set| !set.contains(dependent)) {
                    debug!(
                        package = dependent,
                        trigger = %current,
                        "Cascade outside package filter"
                    );
                    continue;
                }
                triggers
                    .entry(dependent.to_string())
                    .or_default()
                    .push(current.clone());
                if visited.insert(dependent.to_string()) {
                    let current_version = self.tags.last_stable(dependent).cloned();
                    let next = calculator.calculate(
                        dependent,
                        current_version.as_ref(),
                        BumpType::Patch,
                        mode,
                    );
                    versions.insert(dependent.to_string(), next.version.clone());
                    planned.push((dependent.to_string(), current_version, next));
                    queue.push_back(dependent.to_string());
                }
            }
        }

        let cascades: Vec<ReleaseItem> = planned
            .into_iter()
            .map(|(package, current_version, next)| {
                let commits = triggers
                    .remove(&package)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|trigger| {
                        let version = versions.get(&trigger)?.clone();
                        Some(ReleaseCommit::cascade(trigger, version, timestamp))
                    })
                    .collect();
                let scope = packages
                    .iter()
                    .find(|p| p.name == package)
                    .map_or_else(|| package.clone(), |p| p.scope.clone());
                ReleaseItem {
                    package,
                    scope,
                    bump: BumpType::Patch,
                    current_version,
                    next_version: next.version,
                    target_version: next.target,
                    commits,
                    lifecycle: next.lifecycle,
                }
            })
            .collect();

        if !cascades.is_empty() {
            info!(
                count = cascades.len(),
                packages = ?cascades.iter().map(|c| c.package.as_str()).collect::<Vec<_>>(),
                "Detected cascade releases"
            );
        }
        Ok(cascades)
    }
}
