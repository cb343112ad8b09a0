//! Topological analysis of pipeline graphs.
//!
//! Provides algorithms for:
//! - Topological sorting (execution order)
//! - Cycle detection with the exact cycle path
//! - Dependency lookups for a node
//!
//! Edges with a missing endpoint, or one naming an unknown node, are left
//! out of every analysis here; reporting them is the validator's job.

use crate::core::error::{GraphError, GraphResult, NodeId};
use crate::graph::connection::Edge;
use crate::graph::structure::{GraphNode, PipelineGraph};
use indexmap::IndexSet;
use std::collections::VecDeque;

/// Execution order of `nodes` (Kahn's algorithm).
///
/// When several nodes are ready at once they are taken in first-seen
/// order, so the result is stable for a given definition. Repeated IDs
/// count once. Fails with [`GraphError::CycleDetected`] listing the nodes
/// that could not be ordered.
pub fn topological_order(nodes: &[GraphNode], edges: &[Edge]) -> GraphResult<Vec<NodeId>> {
    let ids: IndexSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let (adjacency, mut in_degree) = index_edges(&ids, edges);

    let mut queue: VecDeque<usize> = (0..ids.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(ids.len());

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &neighbor in &adjacency[node] {
            in_degree[neighbor] -= 1;
            if in_degree[neighbor] == 0 {
                queue.push_back(neighbor);
            }
        }
    }

    // If we haven't visited all nodes, there's a cycle
    if order.len() < ids.len() {
        let remaining = (0..ids.len())
            .filter(|&i| in_degree[i] > 0)
            .filter_map(|i| ids.get_index(i).map(|id| (*id).clone()))
            .collect();
        return Err(GraphError::CycleDetected { nodes: remaining });
    }

    Ok(order
        .into_iter()
        .filter_map(|i| ids.get_index(i).map(|id| (*id).clone()))
        .collect())
}

/// Adjacency lists and in-degrees by node position, edges in definition order.
fn index_edges(ids: &IndexSet<&NodeId>, edges: &[Edge]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut adjacency = vec![Vec::new(); ids.len()];
    let mut in_degree = vec![0; ids.len()];

    for edge in edges {
        let Some((from, to)) = edge.endpoints() else {
            continue;
        };
        if let (Some(from), Some(to)) = (ids.get_index_of(from), ids.get_index_of(to)) {
            adjacency[from].push(to);
            in_degree[to] += 1;
        }
    }

    (adjacency, in_degree)
}

/// Analyzer for graph topology.
pub struct TopologyAnalyzer<'a> {
    graph: &'a PipelineGraph,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Create a new analyzer for the given graph.
    pub fn new(graph: &'a PipelineGraph) -> Self {
        Self { graph }
    }

    /// Get the topological sort order.
    ///
    /// Returns nodes in an order where dependencies come before dependents.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        topological_order(self.graph.nodes(), self.graph.edges())
    }

    /// Find cycles by depth-first search.
    ///
    /// Each cycle is reported once, as the path from the revisited node back
    /// to itself (e.g. `[a, b, c, a]`). One search is rooted at every node
    /// not reached by an earlier search, in definition order.
    pub fn find_cycles(&self) -> Vec<Vec<NodeId>> {
        let ids: IndexSet<&NodeId> = self.graph.node_ids();
        let (adjacency, _) = index_edges(&ids, self.graph.edges());

        let mut search = CycleSearch {
            adjacency: &adjacency,
            visited: vec![false; ids.len()],
            on_stack: vec![false; ids.len()],
            path: Vec::new(),
            cycles: Vec::new(),
        };
        for root in 0..ids.len() {
            if !search.visited[root] {
                search.visit(root);
            }
        }

        search
            .cycles
            .into_iter()
            .map(|cycle| {
                cycle
                    .into_iter()
                    .filter_map(|i| ids.get_index(i).map(|id| (*id).clone()))
                    .collect()
            })
            .collect()
    }

    /// Check if the graph has any cycles.
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }

    /// Edges ending at `id` whose upstream endpoint is present, in definition order.
    pub fn inbound_edges(&self, id: &str) -> Vec<&'a Edge> {
        self.graph
            .edges()
            .iter()
            .filter(|e| e.is_to(id) && e.from.is_some())
            .collect()
    }

    /// Upstream node IDs of `id`, in edge order.
    pub fn predecessors(&self, id: &str) -> Vec<&'a NodeId> {
        self.inbound_edges(id)
            .into_iter()
            .filter_map(|e| e.from.as_ref())
            .collect()
    }

    /// Downstream node IDs of `id`, in edge order.
    pub fn successors(&self, id: &str) -> Vec<&'a NodeId> {
        self.graph
            .edges()
            .iter()
            .filter(|e| e.is_from(id))
            .filter_map(|e| e.to.as_ref())
            .collect()
    }
}

struct CycleSearch<'g> {
    adjacency: &'g [Vec<usize>],
    visited: Vec<bool>,
    on_stack: Vec<bool>,
    path: Vec<usize>,
    cycles: Vec<Vec<usize>>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: usize) {
        self.visited[node] = true;
        self.on_stack[node] = true;
        self.path.push(node);

        let adjacency = self.adjacency;
        for &neighbor in &adjacency[node] {
            if self.on_stack[neighbor] {
                if let Some(start) = self.path.iter().position(|&n| n == neighbor) {
                    let mut cycle = self.path[start..].to_vec();
                    cycle.push(neighbor);
                    self.cycles.push(cycle);
                }
            } else if !self.visited[neighbor] {
                self.visit(neighbor);
            }
        }

        self.path.pop();
        self.on_stack[node] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> PipelineGraph {
        let mut graph = PipelineGraph::new();
        for id in ids {
            graph.add_node(GraphNode::transform(*id, "SORT"));
        }
        for (from, to) in edges {
            graph.connect(*from, *to);
        }
        graph
    }

    fn ids(order: &[NodeId]) -> Vec<&str> {
        order.iter().map(NodeId::as_str).collect()
    }

    #[test]
    fn test_topological_sort() {
        let graph = graph(&["c", "b", "a"], &[("a", "b"), ("b", "c")]);
        let sorted = TopologyAnalyzer::new(&graph).topological_sort().unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stable_first_seen_order() {
        let graph = graph(&["s2", "s1", "j"], &[("s1", "j"), ("s2", "j")]);
        let sorted = topological_order(graph.nodes(), graph.edges()).unwrap();
        assert_eq!(ids(&sorted), vec!["s2", "s1", "j"]);
    }

    #[test]
    fn test_cycle_rejected() {
        let graph = graph(&["s", "a", "b"], &[("s", "a"), ("a", "b"), ("b", "a")]);
        let result = topological_order(graph.nodes(), graph.edges());
        match result {
            Err(GraphError::CycleDetected { nodes }) => assert_eq!(ids(&nodes), vec!["a", "b"]),
            other => panic!("expected cycle error, got {:?}", other),
        }
        assert!(TopologyAnalyzer::new(&graph).has_cycle());
    }

    #[test]
    fn test_dangling_edges_ignored() {
        let graph = graph(&["a", "b"], &[("a", "b"), ("ghost", "b"), ("b", "nowhere")]);
        let sorted = topological_order(graph.nodes(), graph.edges()).unwrap();
        assert_eq!(ids(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_find_cycle_path() {
        let graph = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let cycles = TopologyAnalyzer::new(&graph).find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&cycles[0]), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_disjoint_cycles_reported_once_each() {
        let graph = graph(
            &["a", "b", "x", "y"],
            &[("a", "b"), ("b", "a"), ("x", "y"), ("y", "x")],
        );
        let cycles = TopologyAnalyzer::new(&graph).find_cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(ids(&cycles[0]), vec!["a", "b", "a"]);
        assert_eq!(ids(&cycles[1]), vec!["x", "y", "x"]);
    }

    #[test]
    fn test_self_loop() {
        let graph = graph(&["a"], &[("a", "a")]);
        let cycles = TopologyAnalyzer::new(&graph).find_cycles();
        assert_eq!(ids(&cycles[0]), vec!["a", "a"]);
    }

    #[test]
    fn test_predecessors_in_edge_order() {
        let graph = graph(&["l", "r", "j"], &[("r", "j"), ("l", "j")]);
        let analyzer = TopologyAnalyzer::new(&graph);
        let preds: Vec<&str> = analyzer.predecessors("j").into_iter().map(NodeId::as_str).collect();
        assert_eq!(preds, vec!["r", "l"]);
        assert_eq!(analyzer.successors("l").len(), 1);
    }

    proptest! {
        #[test]
        fn prop_order_respects_every_edge(
            size in 1usize..12,
            pairs in prop::collection::vec((0usize..12, 0usize..12), 0..30),
        ) {
            let names: Vec<String> = (0..size).map(|i| format!("n{}", i)).collect();
            let mut graph = PipelineGraph::new();
            for name in names.iter().rev() {
                graph.add_node(GraphNode::transform(name.as_str(), "SORT"));
            }
            // only forward edges, so the graph is acyclic
            for (a, b) in pairs {
                let (a, b) = (a % size, b % size);
                if a < b {
                    graph.connect(names[a].as_str(), names[b].as_str());
                }
            }

            let order = topological_order(graph.nodes(), graph.edges()).unwrap();
            prop_assert_eq!(order.len(), size);
            let position = |id: &NodeId| order.iter().position(|n| n == id).unwrap();
            for edge in graph.edges() {
                let (from, to) = edge.endpoints().unwrap();
                prop_assert!(position(from) < position(to));
            }
        }

        #[test]
        fn prop_back_edge_is_always_a_cycle(size in 2usize..10) {
            let names: Vec<String> = (0..size).map(|i| format!("n{}", i)).collect();
            let mut graph = PipelineGraph::new();
            for name in &names {
                graph.add_node(GraphNode::transform(name.as_str(), "SORT"));
            }
            for pair in names.windows(2) {
                graph.connect(pair[0].as_str(), pair[1].as_str());
            }
            graph.connect(names[size - 1].as_str(), names[0].as_str());

            prop_assert!(topological_order(graph.nodes(), graph.edges()).is_err());
            prop_assert_eq!(TopologyAnalyzer::new(&graph).find_cycles().len(), 1);
        }
    }
}
