//! Individual validation stages.
//!
//! Each stage checks for a specific category of errors and reports every
//! violation it finds as a human-readable message.

use crate::core::error::NodeId;
use crate::graph::connection::{split_inputs, Edge};
use crate::graph::structure::{NodeRole, PipelineGraph};
use crate::graph::topology::TopologyAnalyzer;
use crate::operators::registry::OperatorRegistry;
use indexmap::IndexSet;
use std::sync::Arc;

/// Trait for validation stages.
pub trait ValidationStage: Send + Sync {
    /// Name of this validation stage.
    fn name(&self) -> &str;

    /// Validate the graph.
    ///
    /// Returns Ok when the stage found nothing, or Err with every violation.
    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>>;
}

fn verdict(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Cycle detection.
///
/// Reports each cycle as the path from the revisited node back to itself,
/// e.g. `Cycle detected: a → b → a`.
pub struct CycleValidation;

impl ValidationStage for CycleValidation {
    fn name(&self) -> &str {
        "Cycle Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let errors = TopologyAnalyzer::new(graph)
            .find_cycles()
            .into_iter()
            .map(|cycle| {
                let path: Vec<&str> = cycle.iter().map(NodeId::as_str).collect();
                format!("Cycle detected: {}", path.join(" → "))
            })
            .collect();
        verdict(errors)
    }
}

/// Orphan detection by role.
///
/// Sources need an outgoing edge, sinks an incoming one and transforms
/// both. Nodes of any other role need at least one edge. An edge counts
/// for its present endpoint even when the other endpoint is missing.
pub struct ConnectivityValidation;

impl ValidationStage for ConnectivityValidation {
    fn name(&self) -> &str {
        "Connectivity Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let with_incoming: IndexSet<&str> = graph
            .edges()
            .iter()
            .filter_map(|e| e.to.as_ref().map(NodeId::as_str))
            .collect();
        let with_outgoing: IndexSet<&str> = graph
            .edges()
            .iter()
            .filter_map(|e| e.from.as_ref().map(NodeId::as_str))
            .collect();

        let mut errors = Vec::new();
        for node in graph.nodes() {
            let id = node.id.as_str();
            let incoming = with_incoming.contains(id);
            let outgoing = with_outgoing.contains(id);
            match node.role {
                NodeRole::Source if !outgoing => {
                    errors.push(format!("Source node '{}' has no outgoing connections", id));
                }
                NodeRole::Sink if !incoming => {
                    errors.push(format!("Load node '{}' has no incoming connections", id));
                }
                NodeRole::Transform => {
                    if !incoming {
                        errors.push(format!("Transform node '{}' has no incoming connections", id));
                    }
                    if !outgoing {
                        errors.push(format!("Transform node '{}' has no outgoing connections", id));
                    }
                }
                NodeRole::Other(_) if !incoming && !outgoing => {
                    errors.push(format!("Node '{}' has no connections", id));
                }
                _ => {}
            }
        }
        verdict(errors)
    }
}

/// Per-node configuration completeness.
///
/// Checks that the kind is registered and fits the node's role, that every
/// required key is present, then runs the operator's own static checks.
pub struct ConfigValidation {
    registry: Arc<OperatorRegistry>,
}

impl ConfigValidation {
    /// Create a stage checking against the given catalog.
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }
}

impl ValidationStage for ConfigValidation {
    fn name(&self) -> &str {
        "Configuration Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for node in graph.nodes() {
            let id = &node.id;
            if node.kind.trim().is_empty() {
                errors.push(format!("Node '{}' has no operator kind", id));
                continue;
            }
            let Some(entry) = self.registry.get_entry(&node.kind) else {
                errors.push(format!("Node '{}': unknown operator kind '{}'", id, node.kind));
                continue;
            };

            let metadata = &entry.metadata;
            match node.role.category() {
                Some(category) if category != metadata.category => errors.push(format!(
                    "Node '{}': {} is a {} operator but the node is a {} node",
                    id,
                    node.kind,
                    metadata.category.display_name().to_lowercase(),
                    node.role.as_wire()
                )),
                Some(_) => {}
                None => errors.push(format!("Node '{}': unknown node type '{}'", id, node.role)),
            }

            errors.extend(
                metadata
                    .requirements
                    .iter()
                    .filter_map(|r| r.check(&node.kind, &node.config))
                    .map(|message| format!("Node '{}': {}", id, message)),
            );

            let operator = (entry.factory)();
            errors.extend(
                operator
                    .validate_config(&node.config)
                    .into_iter()
                    .map(|message| format!("Node '{}': {}", id, message)),
            );

            if metadata.multi_input {
                let inbound: Vec<&Edge> = graph.edges_to(id.as_str()).collect();
                if let Err(message) = split_inputs(&node.kind, &inbound) {
                    errors.push(format!("Node '{}': {}", id, message));
                }
            }
        }
        verdict(errors)
    }
}

/// Edge referential integrity, reported per edge index.
pub struct EdgeValidation;

impl ValidationStage for EdgeValidation {
    fn name(&self) -> &str {
        "Edge Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let ids = graph.node_ids();
        let mut errors = Vec::new();
        for (idx, edge) in graph.edges().iter().enumerate() {
            let from = edge.from.as_ref().filter(|f| !f.as_str().is_empty());
            let to = edge.to.as_ref().filter(|t| !t.as_str().is_empty());
            let (from, to) = match (from, to) {
                (None, _) => {
                    errors.push(format!("Edge {}: Missing 'from' node", idx));
                    continue;
                }
                (_, None) => {
                    errors.push(format!("Edge {}: Missing 'to' node", idx));
                    continue;
                }
                (Some(from), Some(to)) => (from, to),
            };
            if !ids.contains(from) {
                errors.push(format!("Edge {}: 'from' node '{}' does not exist", idx, from));
            }
            if !ids.contains(to) {
                errors.push(format!("Edge {}: 'to' node '{}' does not exist", idx, to));
            }
        }
        verdict(errors)
    }
}

/// Structural minimums: at least one source and one sink.
pub struct StructureValidation;

impl ValidationStage for StructureValidation {
    fn name(&self) -> &str {
        "Structure Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if graph.nodes_with_role(&NodeRole::Source).next().is_none() {
            errors.push("Pipeline must have at least one SOURCE node".to_string());
        }
        if graph.nodes_with_role(&NodeRole::Sink).next().is_none() {
            errors.push("Pipeline must have at least one LOAD node".to_string());
        }
        verdict(errors)
    }
}

/// Node identity: every node has an id and no id repeats.
pub struct IdentityValidation;

impl ValidationStage for IdentityValidation {
    fn name(&self) -> &str {
        "Identity Validation"
    }

    fn validate(&self, graph: &PipelineGraph) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.id.as_str().trim().is_empty())
            .map(|(index, _)| format!("Node {}: missing 'id'", index))
            .collect();
        errors.extend(
            graph
                .duplicate_ids()
                .into_iter()
                .filter(|id| !id.as_str().trim().is_empty())
                .map(|id| format!("Duplicate node id '{}'", id)),
        );
        verdict(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::structure::GraphNode;

    fn errors(stage: &dyn ValidationStage, graph: &PipelineGraph) -> Vec<String> {
        stage.validate(graph).err().unwrap_or_default()
    }

    fn linear() -> PipelineGraph {
        PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE").with("file_path", "in.csv"))
            .with_node(
                GraphNode::transform("t", "FILTER")
                    .with("column", "amt")
                    .with("operator", ">")
                    .with("value", 0),
            )
            .with_node(GraphNode::sink("l", "CSV_LOAD"))
            .with_edge("s", "t")
            .with_edge("t", "l")
    }

    #[test]
    fn test_cycle_messages() {
        let graph = PipelineGraph::new()
            .with_node(GraphNode::transform("a", "SORT"))
            .with_node(GraphNode::transform("b", "SORT"))
            .with_edge("a", "b")
            .with_edge("b", "a");
        assert_eq!(errors(&CycleValidation, &graph), vec!["Cycle detected: a → b → a"]);
        assert!(CycleValidation.validate(&linear()).is_ok());
    }

    #[test]
    fn test_orphans_by_role() {
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE"))
            .with_node(GraphNode::transform("t", "SORT"))
            .with_node(GraphNode::sink("l", "CSV_LOAD"))
            .with_node(GraphNode::new("x", NodeRole::from_wire("MYSTERY"), "SORT"));
        assert_eq!(
            errors(&ConnectivityValidation, &graph),
            vec![
                "Source node 's' has no outgoing connections",
                "Transform node 't' has no incoming connections",
                "Transform node 't' has no outgoing connections",
                "Load node 'l' has no incoming connections",
                "Node 'x' has no connections",
            ]
        );
    }

    #[test]
    fn test_dangling_edge_still_counts() {
        let mut graph = PipelineGraph::new().with_node(GraphNode::source("s", "CSV_SOURCE"));
        graph.add_edge(Edge {
            from: Some(NodeId::from("s")),
            to: None,
            port: None,
        });
        assert!(ConnectivityValidation.validate(&graph).is_ok());
        assert_eq!(errors(&EdgeValidation, &graph), vec!["Edge 0: Missing 'to' node"]);
    }

    #[test]
    fn test_config_requirements() {
        let stage = ConfigValidation::new(Arc::new(OperatorRegistry::with_builtins()));
        assert!(stage.validate(&linear()).is_ok());

        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE"))
            .with_node(GraphNode::transform("f", "FILTER").with("column", "a").with("operator", "~"))
            .with_node(GraphNode::transform("j", "JOIN"))
            .with_node(GraphNode::transform("u", "UNPIVOT"))
            .with_node(GraphNode::sink("d", "DB_SOURCE").with("connection_string", "x.db").with("query", "q"));
        let found = errors(&stage, &graph);
        assert!(found.contains(&"Node 's': CSV_SOURCE requires 'file_path'".to_string()));
        assert!(found.contains(&"Node 'f': FILTER requires 'value'".to_string()));
        assert!(found.iter().any(|e| e.starts_with("Node 'f': ") && e.contains('~')));
        assert!(found.contains(&"Node 'j': JOIN requires 'join_type'".to_string()));
        assert!(found.contains(&"Node 'j': JOIN requires 'left_on'".to_string()));
        assert!(found.contains(&"Node 'j': JOIN requires 'right_on'".to_string()));
        assert!(found.contains(&"Node 'u': unknown operator kind 'UNPIVOT'".to_string()));
        assert!(found.iter().any(|e| e.starts_with("Node 'd': DB_SOURCE is a source operator")));
    }

    #[test]
    fn test_filter_value_may_be_falsy() {
        let stage = ConfigValidation::new(Arc::new(OperatorRegistry::with_builtins()));
        let graph = PipelineGraph::new().with_node(
            GraphNode::transform("f", "FILTER")
                .with("column", "a")
                .with("operator", "==")
                .with("value", ""),
        );
        assert!(stage.validate(&graph).is_ok());
    }

    #[test]
    fn test_join_input_conflicts() {
        let stage = ConfigValidation::new(Arc::new(OperatorRegistry::with_builtins()));
        let join = GraphNode::transform("j", "JOIN")
            .with("join_type", "inner")
            .with("left_on", "k")
            .with("right_on", "k");
        let sources = PipelineGraph::new()
            .with_node(GraphNode::source("a", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(GraphNode::source("b", "CSV_SOURCE").with("file_path", "b.csv"))
            .with_node(GraphNode::source("c", "CSV_SOURCE").with("file_path", "c.csv"))
            .with_node(join);

        let mut tagged = sources.clone();
        tagged.add_edge(Edge::new("a", "j").with_port("left"));
        tagged.add_edge(Edge::new("b", "j").with_port("primary"));
        assert_eq!(errors(&stage, &tagged), vec!["Node 'j': JOIN has two inputs tagged 'left'"]);

        let crowded = sources.clone().with_edge("a", "j").with_edge("b", "j").with_edge("c", "j");
        assert_eq!(
            errors(&stage, &crowded),
            vec!["Node 'j': JOIN takes two inputs but has 3 inbound edges"]
        );

        let mut resolved = sources;
        resolved.add_edge(Edge::new("a", "j").with_port("right"));
        resolved.add_edge(Edge::new("b", "j"));
        assert!(stage.validate(&resolved).is_ok());
    }

    #[test]
    fn test_edge_references() {
        let graph = linear().with_edge("ghost", "l").with_edge("t", "nowhere");
        assert_eq!(
            errors(&EdgeValidation, &graph),
            vec![
                "Edge 2: 'from' node 'ghost' does not exist",
                "Edge 3: 'to' node 'nowhere' does not exist",
            ]
        );
    }

    #[test]
    fn test_structure_minimums() {
        let graph = PipelineGraph::new().with_node(GraphNode::transform("t", "SORT"));
        assert_eq!(
            errors(&StructureValidation, &graph),
            vec![
                "Pipeline must have at least one SOURCE node",
                "Pipeline must have at least one LOAD node",
            ]
        );
    }

    #[test]
    fn test_identity() {
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE"))
            .with_node(GraphNode::source("s", "CSV_SOURCE"))
            .with_node(GraphNode::sink("", "CSV_LOAD"));
        assert_eq!(
            errors(&IdentityValidation, &graph),
            vec!["Node 2: missing 'id'", "Duplicate node id 's'"]
        );
    }
}
