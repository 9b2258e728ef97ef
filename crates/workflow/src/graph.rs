//! Workflow graph.
//!
//! Builds a directed acyclic graph of [`Node`]s from a release [`Plan`]:
//! a global preflight node gates a `publish -> tag -> push -> release` chain
//! for every item.

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, PREFLIGHT_ID, node_id};
use monorel_release::Plan;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Collects nodes before validating them into a [`WorkflowGraph`].
#[derive(Debug, Default)]
pub struct WorkflowGraphBuilder {
    nodes: Vec<Node>,
}

impl WorkflowGraphBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    #[must_use]
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Validate dependencies and build the graph.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids, dependencies on unknown nodes, or
    /// cycles.
    pub fn build(self) -> Result<WorkflowGraph> {
        let mut graph = DiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in &self.nodes {
            if id_to_index.contains_key(&node.id) {
                return Err(Error::graph(format!("duplicate node '{}'", node.id)));
            }
            let index = graph.add_node(node.id.clone());
            id_to_index.insert(node.id.clone(), index);
        }

        let mut edges = Vec::new();
        for node in &self.nodes {
            let index = id_to_index[&node.id];
            for dependency in &node.dependencies {
                let dep_index = id_to_index.get(dependency).ok_or_else(|| {
                    Error::graph(format!(
                        "node '{}' depends on unknown node '{dependency}'",
                        node.id
                    ))
                })?;
                // dependency -> dependent
                edges.push((*dep_index, index));
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        let order: Vec<NodeIndex> = toposort(&graph, None).map_err(|cycle| {
            Error::graph(format!(
                "dependency cycle involving '{}'",
                graph[cycle.node_id()]
            ))
        })?;

        let mut by_id: HashMap<String, Node> =
            self.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let nodes = order
            .into_iter()
            .filter_map(|index| by_id.remove(&graph[index]))
            .collect();

        Ok(WorkflowGraph { nodes })
    }
}

/// A validated, topologically ordered workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: Vec<Node>,
}

impl WorkflowGraph {
    /// Build the workflow for a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan lists a package twice.
    pub fn from_plan(plan: &Plan) -> Result<Self> {
        let mut builder = WorkflowGraphBuilder::new().node(Node::preflight());
        for item in plan.items() {
            let mut previous = PREFLIGHT_ID.to_string();
            for kind in NodeKind::ITEM_STAGES {
                let node = Node::for_item(kind, &item.package, previous);
                previous = node_id(kind, &item.package);
                builder = builder.node(node);
            }
        }
        builder.build()
    }

    /// Nodes in a valid execution order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes whose dependencies are all in `done` and that are neither done
    /// nor in `scheduled`.
    #[must_use]
    pub fn ready<'a>(
        &'a self,
        done: &HashSet<String>,
        scheduled: &HashSet<String>,
    ) -> Vec<&'a Node> {
        self.nodes
            .iter()
            .filter(|n| !done.contains(&n.id) && !scheduled.contains(&n.id))
            .filter(|n| n.dependencies.iter().all(|d| done.contains(d)))
            .collect()
    }

    /// Every node that transitively depends on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> HashSet<String> {
        let mut blocked: HashSet<String> = HashSet::new();
        // Nodes are topologically ordered, so one forward pass suffices.
        for node in &self.nodes {
            if node
                .dependencies
                .iter()
                .any(|d| d == id || blocked.contains(d))
            {
                blocked.insert(node.id.clone());
            }
        }
        blocked
    }
}
