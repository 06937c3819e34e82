//! Package graph builder using petgraph.
//!
//! Edges run from a dependency to its dependents, so walking outgoing edges
//! visits the packages that must be released after (or because of) a node.

use crate::{Error, PackageNodeData, Result};
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::IntoNodeReferences;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::Write as _;
use tracing::debug;

/// Names of packages grouped by publish level.
///
/// Every package in level `k` depends only on packages in levels `< k`.
pub type PublishLevels = Vec<Vec<String>>;

/// A node in the package graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name of the package.
    pub name: String,
    /// The package data.
    pub package: T,
}

/// Directed dependency graph over workspace packages.
pub struct PackageGraph<T: PackageNodeData> {
    graph: DiGraph<GraphNode<T>, ()>,
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: PackageNodeData> PackageGraph<T> {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Build a graph from `(name, package)` pairs and wire up its edges.
    pub fn from_packages<I>(packages: I) -> Self
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let mut graph = Self::new();
        for (name, package) in packages {
            graph.add_package(&name, package);
        }
        graph.add_dependency_edges();
        graph
    }

    /// Add a package node. Returns the existing index if the name is taken.
    pub fn add_package(&mut self, name: &str, package: T) -> NodeIndex {
        if let Some(&node) = self.name_to_node.get(name) {
            return node;
        }

        let index = self.graph.add_node(GraphNode {
            name: name.to_string(),
            package,
        });
        self.name_to_node.insert(name.to_string(), index);
        debug!(package = name, "Added package node");
        index
    }

    /// Add dependency edges after all packages have been added.
    ///
    /// Dependencies naming packages outside the graph are skipped. Returns
    /// the number of edges in the graph.
    pub fn add_dependency_edges(&mut self) -> usize {
        let mut edges_to_add = Vec::new();

        for (node_index, node) in self.graph.node_references() {
            for dep_name in node.package.dependency_names() {
                if let Some(&dep_index) = self.name_to_node.get(dep_name) {
                    edges_to_add.push((dep_index, node_index));
                } else {
                    debug!(
                        package = %node.name,
                        dependency = dep_name,
                        "Ignoring dependency outside the graph"
                    );
                }
            }
        }

        for (from, to) in edges_to_add {
            self.graph.update_edge(from, to, ());
        }

        self.graph.edge_count()
    }

    /// Number of packages in the graph.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a package exists in the graph.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Get a package node by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GraphNode<T>> {
        self.name_to_node
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Iterate over all nodes in insertion order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode<T>> {
        self.graph.node_weights()
    }

    /// Names of the packages that `name` depends on inside the graph, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPackage`] if `name` is not in the graph.
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>> {
        self.neighbor_names(name, Direction::Incoming)
    }

    /// Names of the packages that depend directly on `name`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPackage`] if `name` is not in the graph.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>> {
        self.neighbor_names(name, Direction::Outgoing)
    }

    fn neighbor_names(&self, name: &str, direction: Direction) -> Result<Vec<String>> {
        let index = self
            .name_to_node
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownPackage {
                name: name.to_string(),
            })?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Compute publish levels with Kahn's algorithm.
    ///
    /// Names within a level are sorted so the output is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] naming every package on a cycle when
    /// the sort cannot visit every node.
    pub fn publish_levels(&self) -> Result<PublishLevels> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut current: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();
        let mut visited = 0usize;
        let mut levels = Vec::new();

        while !current.is_empty() {
            visited += current.len();
            let mut next = Vec::new();
            for &node in &current {
                for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    let degree = &mut in_degree[dependent.index()];
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent);
                    }
                }
            }

            let mut names: Vec<String> = current
                .iter()
                .map(|&n| self.graph[n].name.clone())
                .collect();
            names.sort();
            levels.push(names);
            current = next;
        }

        if visited != self.graph.node_count() {
            let leftover: BTreeSet<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|n| in_degree[n.index()] > 0)
                .collect();
            return Err(Error::CycleDetected {
                cycles: self.cycles_within(&leftover),
            });
        }

        debug!(levels = levels.len(), "Computed publish levels");
        Ok(levels)
    }

    /// Flattened publish order: dependencies always come before dependents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        Ok(self.publish_levels()?.into_iter().flatten().collect())
    }

    /// Every strongly connected component among `nodes` that is a real cycle:
    /// more than one member, or a single member depending on itself.
    fn cycles_within(&self, nodes: &BTreeSet<NodeIndex>) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.iter().all(|n| nodes.contains(n)))
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.contains_edge(n, n))
            })
            .map(|component| {
                let mut names: Vec<String> = component
                    .into_iter()
                    .map(|n| self.graph[n].name.clone())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Propagate values from seeded packages to their transitive dependents.
    ///
    /// Each dependent of a node holding value `v` is offered `transfer(v)`;
    /// a node keeps the maximum of everything it is offered and its seed.
    /// The walk is a worklist over node indices and runs until no value
    /// changes, so the result does not depend on seed order and re-running
    /// it on its own output changes nothing. Seeds naming unknown packages
    /// are ignored.
    pub fn propagate<B, F>(&self, seeds: &HashMap<String, B>, transfer: F) -> HashMap<String, B>
    where
        B: Copy + Ord,
        F: Fn(B) -> B,
    {
        let mut values: Vec<Option<B>> = vec![None; self.graph.node_count()];
        let mut worklist = VecDeque::new();

        for (name, &value) in seeds {
            match self.name_to_node.get(name) {
                Some(&index) => {
                    let slot = &mut values[index.index()];
                    if slot.is_none_or(|current| value > current) {
                        *slot = Some(value);
                        worklist.push_back(index);
                    }
                }
                None => debug!(package = %name, "Ignoring seed for package outside the graph"),
            }
        }

        while let Some(index) = worklist.pop_front() {
            let Some(value) = values[index.index()] else {
                continue;
            };
            let offered = transfer(value);
            for dependent in self.graph.neighbors_directed(index, Direction::Outgoing) {
                let slot = &mut values[dependent.index()];
                if slot.is_none_or(|current| offered > current) {
                    *slot = Some(offered);
                    worklist.push_back(dependent);
                }
            }
        }

        self.graph
            .node_indices()
            .filter_map(|n| values[n.index()].map(|v| (self.graph[n].name.clone(), v)))
            .collect()
    }

    /// Render the graph in Graphviz DOT format, dependents pointing at
    /// their dependencies.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut names: Vec<&str> = self.graph.node_weights().map(|n| n.name.as_str()).collect();
        names.sort_unstable();

        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(dep, dependent)| {
                (
                    self.graph[dependent].name.as_str(),
                    self.graph[dep].name.as_str(),
                )
            })
            .collect();
        edges.sort_unstable();

        let mut out = String::from("digraph packages {\n    rankdir=LR;\n");
        for name in names {
            let _ = writeln!(out, "    \"{name}\";");
        }
        for (from, to) in edges {
            let _ = writeln!(out, "    \"{from}\" -> \"{to}\";");
        }
        out.push_str("}\n");
        out
    }
}

impl<T: PackageNodeData + Clone> PackageGraph<T> {
    /// Build a new graph holding only the packages accepted by `keep`.
    ///
    /// Edges to dropped packages disappear with them.
    #[must_use]
    pub fn retain<F>(&self, keep: F) -> Self
    where
        F: Fn(&GraphNode<T>) -> bool,
    {
        Self::from_packages(
            self.graph
                .node_weights()
                .filter(|node| keep(node))
                .map(|node| (node.name.clone(), node.package.clone())),
        )
    }
}

impl<T: PackageNodeData> Default for PackageGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct TestPackage {
        deps: Vec<String>,
    }

    impl TestPackage {
        fn new(deps: &[&str]) -> Self {
            Self {
                deps: deps.iter().map(|s| (*s).to_string()).collect(),
            }
        }
    }

    impl PackageNodeData for TestPackage {
        fn dependency_names(&self) -> impl Iterator<Item = &str> {
            self.deps.iter().map(String::as_str)
        }
    }

    fn graph(spec: &[(&str, &[&str])]) -> PackageGraph<TestPackage> {
        PackageGraph::from_packages(
            spec.iter()
                .map(|(name, deps)| ((*name).to_string(), TestPackage::new(deps))),
        )
    }

    #[test]
    fn test_empty_graph() {
        let graph: PackageGraph<TestPackage> = PackageGraph::new();
        assert_eq!(graph.package_count(), 0);
        assert!(graph.publish_levels().unwrap().is_empty());
    }

    #[test]
    fn test_levels_follow_dependencies() {
        let graph = graph(&[
            ("app", &["plugin-a", "plugin-b"]),
            ("plugin-a", &["core"]),
            ("plugin-b", &["core"]),
            ("core", &[]),
        ]);

        let levels = graph.publish_levels().unwrap();
        assert_eq!(
            levels,
            vec![
                vec!["core".to_string()],
                vec!["plugin-a".to_string(), "plugin-b".to_string()],
                vec!["app".to_string()],
            ]
        );
    }

    #[test]
    fn test_external_dependencies_are_ignored() {
        let graph = graph(&[("core", &["serde", "tokio"]), ("cli", &["core", "clap"])]);
        assert_eq!(graph.add_edge_count_for_test(), 1);
        assert_eq!(graph.topological_order().unwrap(), vec!["core", "cli"]);
    }

    #[test]
    fn test_duplicate_dependency_creates_one_edge() {
        let graph = graph(&[("core", &[]), ("cli", &["core", "core"])]);
        assert_eq!(graph.add_edge_count_for_test(), 1);
    }

    #[test]
    fn test_cycle_names_every_member() {
        let graph = graph(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
            ("d", &["a"]),
            ("e", &[]),
        ]);

        let err = graph.publish_levels().unwrap_err();
        match &err {
            Error::CycleDetected { cycles } => {
                assert_eq!(cycles, &vec![vec!["a", "b", "c"]]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph(&[("a", &["a"]), ("b", &[])]);
        let err = graph.publish_levels().unwrap_err();
        assert_eq!(err.cycle_members(), vec!["a"]);
    }

    #[test]
    fn test_two_disjoint_cycles() {
        let graph = graph(&[("a", &["b"]), ("b", &["a"]), ("x", &["y"]), ("y", &["x"])]);
        let err = graph.publish_levels().unwrap_err();
        assert_eq!(err.cycle_members(), vec!["a", "b", "x", "y"]);
    }

    #[test]
    fn test_dependents_and_dependencies() {
        let graph = graph(&[("core", &[]), ("a", &["core"]), ("b", &["core"])]);
        assert_eq!(graph.dependents_of("core").unwrap(), vec!["a", "b"]);
        assert_eq!(graph.dependencies_of("a").unwrap(), vec!["core"]);
        assert!(graph.dependents_of("missing").is_err());
    }

    #[test]
    fn test_propagate_transitively_with_cap() {
        let graph = graph(&[("core", &[]), ("mid", &["core"]), ("top", &["mid"])]);
        let seeds = HashMap::from([("core".to_string(), 3u8)]);

        let values = graph.propagate(&seeds, |v| v.min(1));
        assert_eq!(values.get("core"), Some(&3));
        assert_eq!(values.get("mid"), Some(&1));
        assert_eq!(values.get("top"), Some(&1));
    }

    #[test]
    fn test_propagate_keeps_larger_seed() {
        let graph = graph(&[("core", &[]), ("app", &["core"])]);
        let seeds = HashMap::from([("core".to_string(), 2u8), ("app".to_string(), 3u8)]);

        let values = graph.propagate(&seeds, |v| v.min(1));
        assert_eq!(values.get("app"), Some(&3));
    }

    #[test]
    fn test_propagate_takes_max_over_upstreams() {
        let graph = graph(&[("a", &[]), ("b", &[]), ("app", &["a", "b"])]);
        let seeds = HashMap::from([("a".to_string(), 1u8), ("b".to_string(), 3u8)]);

        let values = graph.propagate(&seeds, |v| v);
        assert_eq!(values.get("app"), Some(&3));
    }

    #[test]
    fn test_propagate_terminates_on_cycle() {
        let graph = graph(&[("a", &["b"]), ("b", &["a"])]);
        let seeds = HashMap::from([("a".to_string(), 2u8)]);
        let values = graph.propagate(&seeds, |v| v.min(1));
        assert_eq!(values.get("a"), Some(&2));
        assert_eq!(values.get("b"), Some(&1));
    }

    #[test]
    fn test_retain_drops_edges() {
        let graph = graph(&[("core", &[]), ("a", &["core"]), ("b", &["a"])]);
        let filtered = graph.retain(|node| node.name != "a");
        assert_eq!(filtered.package_count(), 2);
        assert_eq!(filtered.publish_levels().unwrap(), vec![vec!["b", "core"]]);
    }

    #[test]
    fn test_to_dot() {
        let graph = graph(&[("core", &[]), ("cli", &["core"])]);
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph packages {"));
        assert!(dot.contains("\"cli\" -> \"core\";"));
        assert!(dot.contains("\"core\";"));
    }

    impl PackageGraph<TestPackage> {
        fn add_edge_count_for_test(&self) -> usize {
            self.graph.edge_count()
        }
    }
}
