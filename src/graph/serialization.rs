//! Wire format for pipeline definitions.
//!
//! ```json
//! {"nodes": [{"id": "s", "type": "SOURCE", "subtype": "CSV_SOURCE", "config": {}}],
//!  "edges": [{"from": "s", "to": "t"}]}
//! ```
//!
//! Edge endpoints also accept `from_node`/`source` and `to_node`/`target`.
//! Every field is optional so that incomplete definitions still parse and
//! can be reported on by the validator.

use crate::core::context::NodeConfig;
use crate::core::error::NodeId;
use crate::graph::connection::Edge;
use crate::graph::structure::{GraphNode, NodeRole, PipelineGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Serializable representation of a pipeline node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Node ID
    #[serde(default)]
    pub id: String,
    /// Role: SOURCE, TRANSFORM or LOAD
    #[serde(rename = "type", default)]
    pub role: String,
    /// Operator kind (to look up in the registry)
    #[serde(default, alias = "kind")]
    pub subtype: String,
    /// Operator configuration
    #[serde(default)]
    pub config: JsonValue,
}

/// Serializable representation of an edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedEdge {
    /// Upstream node ID
    #[serde(default, alias = "from_node", alias = "source")]
    pub from: Option<String>,
    /// Downstream node ID
    #[serde(default, alias = "to_node", alias = "target")]
    pub to: Option<String>,
    /// Input port on the downstream node
    #[serde(
        default,
        alias = "targetHandle",
        alias = "target_handle",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<String>,
}

/// Serializable representation of a complete pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Optional pipeline name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// All nodes
    #[serde(default)]
    pub nodes: Vec<SerializedNode>,
    /// All edges
    #[serde(default)]
    pub edges: Vec<SerializedEdge>,
}

impl SerializedGraph {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to compact JSON (no whitespace).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<SerializedNode> for GraphNode {
    fn from(node: SerializedNode) -> Self {
        GraphNode {
            id: NodeId(node.id),
            role: NodeRole::from_wire(&node.role),
            kind: node.subtype,
            config: NodeConfig::from_json(node.config),
        }
    }
}

impl From<&GraphNode> for SerializedNode {
    fn from(node: &GraphNode) -> Self {
        SerializedNode {
            id: node.id.to_string(),
            role: node.role.as_wire().to_string(),
            subtype: node.kind.clone(),
            config: JsonValue::Object(node.config.as_map().clone()),
        }
    }
}

impl From<SerializedEdge> for Edge {
    fn from(edge: SerializedEdge) -> Self {
        Edge {
            from: edge.from.map(NodeId),
            to: edge.to.map(NodeId),
            port: edge.port,
        }
    }
}

impl From<&Edge> for SerializedEdge {
    fn from(edge: &Edge) -> Self {
        SerializedEdge {
            from: edge.from.as_ref().map(NodeId::to_string),
            to: edge.to.as_ref().map(NodeId::to_string),
            port: edge.port.clone(),
        }
    }
}

impl From<SerializedGraph> for PipelineGraph {
    fn from(graph: SerializedGraph) -> Self {
        PipelineGraph::from_parts(
            graph.nodes.into_iter().map(GraphNode::from).collect(),
            graph.edges.into_iter().map(Edge::from).collect(),
        )
    }
}

impl From<&PipelineGraph> for SerializedGraph {
    fn from(graph: &PipelineGraph) -> Self {
        SerializedGraph {
            name: None,
            nodes: graph.nodes().iter().map(SerializedNode::from).collect(),
            edges: graph.edges().iter().map(SerializedEdge::from).collect(),
        }
    }
}

impl PipelineGraph {
    /// Parse a pipeline definition from wire JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        SerializedGraph::from_json(json).map(PipelineGraph::from)
    }

    /// Serialize to wire JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        SerializedGraph::from(self).to_json()
    }
}
