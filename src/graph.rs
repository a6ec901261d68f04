//! Component dependency graph.
//!
//! Nodes are canonical component paths, edges read "owner uses target". The graph backs two
//! things: rejecting circular component usage while rendering, and the deterministic
//! orderings used for the components-used listing and for asset elevation.

use petgraph::graph::{EdgeReference, NodeIndex};
use petgraph::visit::EdgeFiltered;
use petgraph::{algo::has_path_connecting, Direction, Graph};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{CompilerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    /// Usage inside a component's own template.
    Structural,
    /// Usage inside light content handed to another component. Exempt from cycle checks.
    Slotted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub owner: String,
    pub target: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    graph: Graph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from an ordered edge log. Node insertion order follows first mention.
    pub fn from_edges<'e, I>(root: Option<&str>, edges: I) -> Self
    where
        I: IntoIterator<Item = &'e Edge>,
    {
        let mut graph = DependencyGraph::new();
        if let Some(root) = root {
            graph.add_node(root);
        }
        for edge in edges {
            graph.insert_edge(&edge.owner, &edge.target, edge.kind);
        }
        graph
    }

    pub fn add_node(&mut self, path: &str) -> NodeIndex {
        if let Some(index) = self.index.get(path) {
            return *index;
        }
        let index = self.graph.add_node(path.to_string());
        self.index.insert(path.to_string(), index);
        index
    }

    pub fn has_node(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Record that `owner` uses `target`, rejecting structural edges that close a cycle.
    pub fn add_edge(&mut self, owner: &str, target: &str, kind: EdgeKind) -> Result<()> {
        if kind == EdgeKind::Structural && self.would_cycle(owner, target) {
            return Err(CompilerError::circular(owner, target));
        }
        self.insert_edge(owner, target, kind);
        Ok(())
    }

    fn insert_edge(&mut self, owner: &str, target: &str, kind: EdgeKind) {
        let from = self.add_node(owner);
        let to = self.add_node(target);
        match self.graph.find_edge(from, to) {
            Some(existing) => {
                if kind == EdgeKind::Structural {
                    self.graph[existing] = EdgeKind::Structural;
                }
            }
            None => {
                self.graph.add_edge(from, to, kind);
            }
        }
    }

    /// True when `target` is `owner` or already (structurally) depends on `owner`.
    pub fn would_cycle(&self, owner: &str, target: &str) -> bool {
        if owner == target {
            return true;
        }
        let (Some(&from), Some(&to)) = (self.index.get(owner), self.index.get(target)) else {
            return false;
        };
        let structural = EdgeFiltered::from_fn(&self.graph, |edge: EdgeReference<'_, EdgeKind>| {
            *edge.weight() == EdgeKind::Structural
        });
        has_path_connecting(&structural, to, from, None)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.index.get(path) else {
            return Vec::new();
        };
        // petgraph yields the most recently added edge first
        let mut found: Vec<String> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        found.reverse();
        found
    }

    /// Components `path` uses directly, in first-use order.
    pub fn dependencies_of(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Components that use `path` directly.
    pub fn dependants_of(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// `path` together with everything that transitively uses it.
    pub fn ancestors_of(&self, path: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![path.to_string()];
        while let Some(current) = stack.pop() {
            if seen.insert(current.clone()) {
                stack.extend(self.dependants_of(&current));
            }
        }
        seen
    }

    /// Dependencies before dependants. Nodes are visited in insertion order and their
    /// dependencies in first-use order, so the result is stable for a given edge log.
    pub fn overall_order(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.graph.node_count());
        for index in self.graph.node_indices() {
            self.post_order(&self.graph[index], &mut visited, &mut order);
        }
        order
    }

    fn post_order(&self, path: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(path.to_string()) {
            return;
        }
        for dependency in self.dependencies_of(path) {
            self.post_order(&dependency, visited, order);
        }
        order.push(path.to_string());
    }

    /// Closest-used-first: the reverse of [`Self::overall_order`].
    pub fn components_used(&self) -> Vec<String> {
        let mut order = self.overall_order();
        order.reverse();
        order
    }

    /// The narrowest component that (transitively) uses both `a` and `b`, or is one of them.
    pub fn nearest_common_ancestor(&self, a: &str, b: &str) -> Option<String> {
        let left = self.ancestors_of(a);
        let right = self.ancestors_of(b);
        self.components_used()
            .into_iter()
            .filter(|path| left.contains(path) && right.contains(path))
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(owner: &str, target: &str) -> Edge {
        Edge {
            owner: owner.to_string(),
            target: target.to_string(),
            kind: EdgeKind::Structural,
        }
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("a.webc");
        let b = graph.add_node("a.webc");
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
        assert!(graph.has_node("a.webc"));
    }

    #[test]
    fn test_self_use_is_circular() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a.webc");
        let err = graph.add_edge("a.webc", "a.webc", EdgeKind::Structural).unwrap_err();
        assert!(matches!(err, CompilerError::CircularDependency { .. }));
    }

    #[test]
    fn test_transitive_cycle_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b", EdgeKind::Structural).unwrap();
        graph.add_edge("b", "c", EdgeKind::Structural).unwrap();
        assert!(graph.add_edge("c", "a", EdgeKind::Structural).is_err());
    }

    #[test]
    fn test_slotted_edges_are_exempt() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b", EdgeKind::Slotted).unwrap();
        assert!(graph.add_edge("b", "a", EdgeKind::Structural).is_ok());
        assert!(graph.add_edge("a", "a", EdgeKind::Slotted).is_ok());
    }

    #[test]
    fn test_orders() {
        let edges = vec![
            edge("page", "layout"),
            edge("layout", "button"),
            edge("page", "card"),
            edge("card", "button"),
        ];
        let graph = DependencyGraph::from_edges(Some("page"), &edges);
        assert_eq!(
            graph.overall_order(),
            vec!["button", "layout", "card", "page"]
        );
        assert_eq!(
            graph.components_used(),
            vec!["page", "card", "layout", "button"]
        );
        assert_eq!(graph.dependencies_of("page"), vec!["layout", "card"]);
        assert_eq!(graph.dependants_of("button").len(), 2);
    }

    #[test]
    fn test_nearest_common_ancestor() {
        let edges = vec![
            edge("page", "layout"),
            edge("layout", "nav"),
            edge("layout", "footer"),
            edge("page", "other"),
        ];
        let graph = DependencyGraph::from_edges(Some("page"), &edges);
        assert_eq!(
            graph.nearest_common_ancestor("nav", "footer").as_deref(),
            Some("layout")
        );
        assert_eq!(
            graph.nearest_common_ancestor("nav", "other").as_deref(),
            Some("page")
        );
        assert_eq!(
            graph.nearest_common_ancestor("layout", "nav").as_deref(),
            Some("layout")
        );
    }
}
