//! Pipeline graph structure.
//!
//! The PipelineGraph holds nodes and edges exactly as the caller defined
//! them. Nothing is assumed about their consistency: duplicate ids, dangling
//! edges and cycles are representable so validation can report them.

use crate::core::context::NodeConfig;
use crate::core::error::NodeId;
use crate::core::node::Category;
use crate::graph::connection::Edge;
use indexmap::IndexSet;
use std::fmt;

/// Role of a node in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Reads a dataset from external storage
    Source,
    /// Derives a dataset from upstream nodes
    Transform,
    /// Writes a dataset to external storage
    Sink,
    /// Any role string the engine does not know
    Other(String),
}

impl NodeRole {
    /// Parse a wire role. `LOAD` and `SINK` are both sinks.
    pub fn from_wire(role: &str) -> Self {
        match role.trim().to_uppercase().as_str() {
            "SOURCE" => NodeRole::Source,
            "TRANSFORM" => NodeRole::Transform,
            "LOAD" | "SINK" => NodeRole::Sink,
            _ => NodeRole::Other(role.to_string()),
        }
    }

    /// Role string used on the wire.
    pub fn as_wire(&self) -> &str {
        match self {
            NodeRole::Source => "SOURCE",
            NodeRole::Transform => "TRANSFORM",
            NodeRole::Sink => "LOAD",
            NodeRole::Other(role) => role,
        }
    }

    /// Operator category expected for this role.
    pub fn category(&self) -> Option<Category> {
        match self {
            NodeRole::Source => Some(Category::Source),
            NodeRole::Transform => Some(Category::Transform),
            NodeRole::Sink => Some(Category::Sink),
            NodeRole::Other(_) => None,
        }
    }
}

impl From<Category> for NodeRole {
    fn from(category: Category) -> Self {
        match category {
            Category::Source => NodeRole::Source,
            Category::Transform => NodeRole::Transform,
            Category::Sink => NodeRole::Sink,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A node instance in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Identifier, unique within a valid graph
    pub id: NodeId,
    /// Pipeline role
    pub role: NodeRole,
    /// Operator kind tag (e.g., "CSV_SOURCE", "FILTER")
    pub kind: String,
    /// Operator configuration
    pub config: NodeConfig,
}

impl GraphNode {
    /// Create a node with an empty configuration.
    pub fn new(id: impl Into<NodeId>, role: NodeRole, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            kind: kind.into(),
            config: NodeConfig::new(),
        }
    }

    /// Create a source node.
    pub fn source(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self::new(id, NodeRole::Source, kind)
    }

    /// Create a transform node.
    pub fn transform(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self::new(id, NodeRole::Transform, kind)
    }

    /// Create a sink node.
    pub fn sink(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self::new(id, NodeRole::Sink, kind)
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set one configuration key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key, value);
        self
    }
}

/// A pipeline definition: nodes plus the edges that thread data between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
}

impl PipelineGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph from nodes and edges.
    pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Add a node, returning its ID.
    pub fn add_node(&mut self, node: GraphNode) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add an edge.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Connect `from` to `to`.
    pub fn connect(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        self.edges.push(Edge::new(from, to));
    }

    /// Builder form of [`add_node`](Self::add_node).
    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Builder form of [`connect`](Self::connect).
    pub fn with_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.connect(from, to);
        self
    }

    /// Get nodes in definition order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Get edges in definition order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get the first node with the given ID.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// Check if a node exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Node IDs in definition order, without repeats.
    pub fn node_ids(&self) -> IndexSet<&NodeId> {
        self.nodes.iter().map(|n| &n.id).collect()
    }

    /// IDs that appear on more than one node.
    pub fn duplicate_ids(&self) -> Vec<NodeId> {
        let mut seen = IndexSet::new();
        let mut duplicates = IndexSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                duplicates.insert(node.id.clone());
            }
        }
        duplicates.into_iter().collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges ending at `id`, in definition order.
    pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.is_to(id))
    }

    /// Edges starting at `id`, in definition order.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.is_from(id))
    }

    /// Nodes with the given role.
    pub fn nodes_with_role<'a>(&'a self, role: &'a NodeRole) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes.iter().filter(move |n| &n.role == role)
    }
}
