//! Pipeline executor implementation.
//!
//! The executor runs a pipeline definition node by node in topological
//! order. It does not assume the definition was validated: cycles,
//! duplicate IDs, unknown kinds and missing inputs are all detected here
//! and reported as errors.

use crate::core::context::ExecutionContext;
use crate::core::dataset::Dataset;
use crate::core::error::{EngineError, ExecutionError, GraphError, NodeId};
use crate::core::node::{Category, NodeOutput};
use crate::execution::record::{ExecutionRecord, LogSink, Severity};
use crate::execution::results::ResultStore;
use crate::graph::connection::split_inputs;
use crate::graph::structure::{GraphNode, PipelineGraph};
use crate::graph::topology::{topological_order, TopologyAnalyzer};
use crate::io::TabularIo;
use crate::operators::builtin::RIGHT_NODE_KEY;
use crate::operators::registry::OperatorRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-run settings and the record destination.
#[derive(Clone)]
pub struct RunContext {
    /// Identifier stamped on every record of the run.
    pub run_id: String,
    /// Base name sinks use when no output path is configured.
    pub default_output_name: String,
    /// Where execution records go.
    pub log_sink: Arc<dyn LogSink>,
}

impl RunContext {
    /// Create a run context with the default output name `output_{run_id}`.
    pub fn new(run_id: impl Into<String>, log_sink: Arc<dyn LogSink>) -> Self {
        let run_id = run_id.into();
        Self {
            default_output_name: format!("output_{}", run_id),
            run_id,
            log_sink,
        }
    }

    /// Create a run context with a fresh random run ID.
    pub fn generate(log_sink: Arc<dyn LogSink>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), log_sink)
    }

    /// Set the base output name.
    pub fn with_default_output_name(mut self, name: impl Into<String>) -> Self {
        self.default_output_name = name.into();
        self
    }

    fn record(&self, severity: Severity, message: impl Into<String>) -> ExecutionRecord {
        ExecutionRecord::new(self.run_id.clone(), severity, message)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("default_output_name", &self.default_output_name)
            .field("log_sink", &"<sink>")
            .finish()
    }
}

/// Statistics from a run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Number of nodes that completed.
    pub nodes_executed: usize,
    /// Rows handed to sinks, summed over all sinks.
    pub rows_written: usize,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

/// Result of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Location reported by the last sink in execution order.
    pub final_location: Option<String>,
    /// Locations reported by every sink, in execution order.
    pub locations: Vec<String>,
    /// Run statistics.
    pub stats: ExecutionStats,
}

/// What one node produced, together with its input size.
struct NodeRun {
    output: NodeOutput,
    rows_in: Option<usize>,
}

/// A node failure, with the input size known at the time.
struct NodeFailure {
    error: ExecutionError,
    rows_in: Option<usize>,
}

impl From<ExecutionError> for NodeFailure {
    fn from(error: ExecutionError) -> Self {
        Self { error, rows_in: None }
    }
}

/// Runs pipeline definitions against an operator catalog and an I/O provider.
pub struct PipelineExecutor {
    registry: Arc<OperatorRegistry>,
    io: Arc<dyn TabularIo>,
}

impl PipelineExecutor {
    /// Create an executor.
    pub fn new(registry: Arc<OperatorRegistry>, io: Arc<dyn TabularIo>) -> Self {
        Self { registry, io }
    }

    /// Create an executor over the built-in operator catalog.
    pub fn with_builtins(io: Arc<dyn TabularIo>) -> Self {
        Self::new(Arc::new(OperatorRegistry::with_builtins()), io)
    }

    /// Get the operator registry.
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Parse a wire JSON definition and run it.
    ///
    /// A definition that does not parse is a pipeline-level failure.
    pub fn execute_json(&self, json: &str, run: &RunContext) -> Result<ExecutionOutcome, EngineError> {
        match PipelineGraph::from_json(json) {
            Ok(graph) => self.execute(&graph, run),
            Err(e) => Err(self.pipeline_failure(run, GraphError::InvalidDefinition(e.to_string()))),
        }
    }

    /// Run a pipeline.
    ///
    /// Nodes run one at a time in topological order and the run stops at
    /// the first failing node. Each attempted node appends exactly one
    /// record to the run's sink before this returns.
    pub fn execute(&self, graph: &PipelineGraph, run: &RunContext) -> Result<ExecutionOutcome, EngineError> {
        let start = Instant::now();

        if let Some(duplicate) = graph.duplicate_ids().into_iter().next() {
            return Err(self.pipeline_failure(run, GraphError::DuplicateNode(duplicate)));
        }
        let order = match topological_order(graph.nodes(), graph.edges()) {
            Ok(order) => order,
            Err(e) => return Err(self.pipeline_failure(run, e)),
        };

        log::info!("run {}: executing {} nodes", run.run_id, order.len());

        let analyzer = TopologyAnalyzer::new(graph);
        let mut results = ResultStore::new();
        let mut outcome = ExecutionOutcome::default();

        for node_id in &order {
            let Some(node) = graph.node(node_id.as_str()) else {
                continue;
            };
            log::debug!("run {}: dispatching {} node '{}' ({})", run.run_id, node.role, node.id, node.kind);

            match self.execute_node(node, &analyzer, &results, run) {
                Ok(NodeRun { output, rows_in }) => {
                    let record = run
                        .record(Severity::Info, output.message())
                        .for_node(node.id.clone())
                        .with_rows_in(rows_in);
                    match output {
                        NodeOutput::Dataset { data, .. } => {
                            let rows_out = data.row_count();
                            run.log_sink.append(record.with_rows_out(Some(rows_out)));
                            log::info!("node '{}' produced {} rows", node.id, rows_out);
                            results.insert(node.id.clone(), data);
                        }
                        NodeOutput::Written { location, .. } => {
                            run.log_sink.append(record);
                            log::info!("node '{}' wrote to {}", node.id, location);
                            outcome.stats.rows_written += rows_in.unwrap_or(0);
                            outcome.locations.push(location);
                        }
                    }
                    outcome.stats.nodes_executed += 1;
                }
                Err(NodeFailure { error, rows_in }) => {
                    log::error!("run {}: {}", run.run_id, error);
                    run.log_sink.append(
                        run.record(Severity::Error, format!("Node execution failed: {}", error))
                            .for_node(node.id.clone())
                            .with_rows_in(rows_in),
                    );
                    return Err(error.into());
                }
            }
        }

        outcome.final_location = outcome.locations.last().cloned();
        outcome.stats.duration = start.elapsed();
        log::info!(
            "run {}: {} nodes executed in {:?}",
            run.run_id,
            outcome.stats.nodes_executed,
            outcome.stats.duration
        );
        Ok(outcome)
    }

    /// Record a failure that stops the run before any node executes.
    fn pipeline_failure(&self, run: &RunContext, error: GraphError) -> EngineError {
        log::error!("run {}: {}", run.run_id, error);
        run.log_sink
            .append(run.record(Severity::Error, format!("Pipeline validation failed: {}", error)));
        error.into()
    }

    /// Execute a single node.
    fn execute_node(
        &self,
        node: &GraphNode,
        analyzer: &TopologyAnalyzer<'_>,
        results: &ResultStore,
        run: &RunContext,
    ) -> Result<NodeRun, NodeFailure> {
        let operator_error = |message: String| ExecutionError::Operator {
            node_id: node.id.clone(),
            message,
        };

        let entry = self
            .registry
            .get_entry(&node.kind)
            .ok_or_else(|| operator_error(format!("unknown operator kind '{}'", node.kind)))?;
        let category = node
            .role
            .category()
            .ok_or_else(|| operator_error(format!("unknown node type '{}'", node.role)))?;
        if entry.metadata.category != category {
            return Err(operator_error(format!(
                "{} is a {} operator and cannot run as a {} node",
                node.kind,
                entry.metadata.category.display_name().to_lowercase(),
                node.role
            ))
            .into());
        }

        let operator = (entry.factory)();
        let config_error = |message: String| ExecutionError::Config {
            node_id: node.id.clone(),
            message,
        };
        if let Some(message) = entry
            .metadata
            .requirements
            .iter()
            .find_map(|requirement| requirement.check(&node.kind, &node.config))
        {
            return Err(config_error(message).into());
        }
        if let Some(message) = operator.validate_config(&node.config).into_iter().next() {
            return Err(config_error(message).into());
        }

        if category == Category::Source {
            let ctx = ExecutionContext::new(&node.id, &node.kind, &node.config)
                .with_io(self.io.as_ref())
                .with_default_output_name(&run.default_output_name);
            let output = operator.execute(&ctx)?;
            return Self::check_output(node, category, output, None);
        }

        let inbound = analyzer.inbound_edges(node.id.as_str());
        let (primary_id, secondary_id) = if entry.metadata.multi_input {
            split_inputs(&node.kind, &inbound).map_err(config_error)?
        } else {
            if inbound.len() > 1 {
                log::warn!(
                    "node '{}' takes one input but has {} inbound edges; using the first",
                    node.id,
                    inbound.len()
                );
            }
            (inbound.first().and_then(|e| e.from.as_ref()), None)
        };
        let primary_id = primary_id.ok_or_else(|| ExecutionError::NoInput {
            node_id: node.id.clone(),
            reason: "no inbound edge".to_string(),
        })?;
        let primary = upstream(node, results, primary_id)?;
        let secondary = secondary_id.map(|id| upstream(node, results, id)).transpose()?;
        let rows_in = Some(primary.row_count());
        let with_rows = |error: ExecutionError| NodeFailure { error, rows_in };

        crate::validation::schema::check_input_schema(
            &node.id,
            &operator.required_columns(&node.config),
            primary,
            secondary,
        )
        .map_err(with_rows)?;

        let mut config = node.config.clone();
        if let Some(right) = secondary_id {
            config.insert(RIGHT_NODE_KEY, right.as_str());
        }
        let mut ctx = ExecutionContext::new(&node.id, &node.kind, &config)
            .with_input(primary)
            .with_io(self.io.as_ref())
            .with_default_output_name(&run.default_output_name);
        if let Some(secondary) = secondary {
            ctx = ctx.with_secondary(secondary);
        }

        let output = operator.execute(&ctx).map_err(with_rows)?;
        Self::check_output(node, category, output, rows_in)
    }

    /// Sinks must report a location; everything else must produce a dataset.
    fn check_output(
        node: &GraphNode,
        category: Category,
        output: NodeOutput,
        rows_in: Option<usize>,
    ) -> Result<NodeRun, NodeFailure> {
        let expected_written = category == Category::Sink;
        let is_written = matches!(output, NodeOutput::Written { .. });
        if expected_written != is_written {
            let message = if expected_written {
                "sink did not report an output location"
            } else {
                "operator did not produce a dataset"
            };
            return Err(NodeFailure {
                error: ExecutionError::Operator {
                    node_id: node.id.clone(),
                    message: message.to_string(),
                },
                rows_in,
            });
        }
        Ok(NodeRun { output, rows_in })
    }
}

/// Look up the stored output of an upstream node.
fn upstream<'r>(node: &GraphNode, results: &'r ResultStore, id: &NodeId) -> Result<&'r Dataset, ExecutionError> {
    results.get(id.as_str()).ok_or_else(|| ExecutionError::NoInput {
        node_id: node.id.clone(),
        reason: format!("upstream node '{}' has not produced a dataset", id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::NodeConfig;
    use crate::core::error::{IoError, IoResult};
    use crate::execution::record::MemoryLogSink;
    use crate::graph::connection::Edge;
    use crate::io::DataFormat;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryIo {
        tables: HashMap<String, Dataset>,
        written: Mutex<Vec<(String, Dataset)>>,
    }

    impl MemoryIo {
        fn with_table(mut self, location: &str, records: serde_json::Value) -> Self {
            let records = records.as_array().cloned().unwrap_or_default();
            self.tables
                .insert(location.to_string(), Dataset::from_json_records(&records).unwrap());
            self
        }
    }

    impl TabularIo for MemoryIo {
        fn load(&self, location: &str, _format: DataFormat, _options: &NodeConfig) -> IoResult<Dataset> {
            self.tables
                .get(location)
                .cloned()
                .ok_or_else(|| IoError::NotFound(location.to_string()))
        }

        fn write(&self, data: &Dataset, location: &str, _: DataFormat, _: &NodeConfig) -> IoResult<String> {
            self.written.lock().push((location.to_string(), data.clone()));
            Ok(format!("mem://{}", location))
        }
    }

    fn setup(io: MemoryIo) -> (PipelineExecutor, Arc<MemoryIo>, Arc<MemoryLogSink>, RunContext) {
        let io = Arc::new(io);
        let executor = PipelineExecutor::with_builtins(io.clone());
        let sink = Arc::new(MemoryLogSink::new());
        let run = RunContext::new("run1", sink.clone());
        (executor, io, sink, run)
    }

    fn orders() -> MemoryIo {
        MemoryIo::default().with_table(
            "orders.csv",
            json!([{"id": 1, "amt": 5}, {"id": 2, "amt": -1}, {"id": 3, "amt": 7}]),
        )
    }

    fn linear() -> PipelineGraph {
        PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE").with("file_path", "orders.csv"))
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
    fn test_linear_pipeline() {
        let (executor, io, sink, run) = setup(orders());
        let outcome = executor.execute(&linear(), &run).unwrap();

        assert_eq!(outcome.final_location.as_deref(), Some("mem://output_run1.csv"));
        assert_eq!(outcome.stats.nodes_executed, 3);
        assert_eq!(outcome.stats.rows_written, 2);
        assert_eq!(io.written.lock()[0].1.row_count(), 2);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.severity == Severity::Info && r.run_id == "run1"));
        assert_eq!((records[0].rows_in, records[0].rows_out), (None, Some(3)));
        assert_eq!((records[1].rows_in, records[1].rows_out), (Some(3), Some(2)));
        assert_eq!((records[2].rows_in, records[2].rows_out), (Some(2), None));
    }

    #[test]
    fn test_cycle_is_pipeline_failure() {
        let (executor, _io, sink, run) = setup(orders());
        let graph = PipelineGraph::new()
            .with_node(GraphNode::transform("a", "SORT").with("columns", json!(["id"])))
            .with_node(GraphNode::transform("b", "SORT").with("columns", json!(["id"])))
            .with_edge("a", "b")
            .with_edge("b", "a");

        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "CycleError");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].node_id.is_none());
        assert!(records[0].message.starts_with("Pipeline validation failed"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let (executor, _io, sink, run) = setup(orders());
        let graph = linear().with_node(GraphNode::sink("l", "JSON_LOAD"));
        let error = executor.execute(&graph, &run).unwrap_err();
        assert!(matches!(error, EngineError::Graph(GraphError::DuplicateNode(_))));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_schema_error_stops_run() {
        let (executor, io, sink, run) = setup(orders());
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE").with("file_path", "orders.csv"))
            .with_node(GraphNode::transform("t", "SELECT").with("columns", json!(["region"])))
            .with_node(GraphNode::sink("l", "CSV_LOAD"))
            .with_edge("s", "t")
            .with_edge("t", "l");

        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "SchemaError");
        assert_eq!(error.node_id().map(|id| id.as_str()), Some("t"));
        assert!(io.written.lock().is_empty());

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].severity, Severity::Error);
        assert_eq!(records[1].rows_in, Some(3));
        assert!(records[1].message.starts_with("Node execution failed"));
    }

    #[test]
    fn test_node_without_input() {
        let (executor, _io, sink, run) = setup(orders());
        let graph = PipelineGraph::new().with_node(GraphNode::sink("l", "CSV_LOAD"));
        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "NoInputError");
        assert_eq!(sink.records_for("l").len(), 1);
    }

    #[test]
    fn test_role_mismatch_is_operator_error() {
        let (executor, _io, _sink, run) = setup(orders());
        let graph = PipelineGraph::new()
            .with_node(GraphNode::transform("s", "CSV_SOURCE").with("file_path", "orders.csv"));
        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "OperatorError");
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let (executor, _io, _sink, run) = setup(orders());
        let graph = PipelineGraph::new().with_node(GraphNode::source("s", "CSV_SOURCE"));
        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
    }

    #[test]
    fn test_join_uses_port_tags() {
        let io = MemoryIo::default()
            .with_table("a.csv", json!([{"k": 1, "x": "a1"}, {"k": 2, "x": "a2"}]))
            .with_table("b.csv", json!([{"k": 2, "y": "b2"}]));
        let (executor, io, _sink, run) = setup(io);
        let mut graph = PipelineGraph::new()
            .with_node(GraphNode::source("z_left", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(GraphNode::source("a_right", "CSV_SOURCE").with("file_path", "b.csv"))
            .with_node(
                GraphNode::transform("j", "JOIN")
                    .with("join_type", "inner")
                    .with("left_on", json!(["k"]))
                    .with("right_on", json!(["k"])),
            )
            .with_node(GraphNode::sink("l", "JSON_LOAD"))
            .with_edge("j", "l");
        graph.add_edge(Edge::new("a_right", "j").with_port("right"));
        graph.add_edge(Edge::new("z_left", "j"));

        executor.execute(&graph, &run).unwrap();
        let written = &io.written.lock()[0].1;
        assert_eq!(written.row_count(), 1);
        assert!(written.column_names().contains(&"x".to_string()));
        assert!(written.column_names().contains(&"y".to_string()));
    }

    #[test]
    fn test_join_with_conflicting_tags_is_config_error() {
        let io = MemoryIo::default()
            .with_table("a.csv", json!([{"k": 1}]))
            .with_table("b.csv", json!([{"k": 1}]));
        let (executor, io, sink, run) = setup(io);
        let mut graph = PipelineGraph::new()
            .with_node(GraphNode::source("a_node", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(GraphNode::source("b_node", "CSV_SOURCE").with("file_path", "b.csv"))
            .with_node(
                GraphNode::transform("j", "JOIN")
                    .with("join_type", "inner")
                    .with("left_on", "k")
                    .with("right_on", "k"),
            )
            .with_node(GraphNode::sink("l", "JSON_LOAD"))
            .with_edge("j", "l");
        graph.add_edge(Edge::new("a_node", "j").with_port("right"));
        graph.add_edge(Edge::new("b_node", "j").with_port("right"));

        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
        assert_eq!(error.node_id().map(|id| id.as_str()), Some("j"));
        assert!(error.to_string().contains("JOIN has two inputs tagged 'right'"));
        assert!(io.written.lock().is_empty());
        assert_eq!(sink.records_for("j").len(), 1);
        assert!(sink.records_for("j")[0].is_error());
    }

    #[test]
    fn test_join_with_three_inputs_is_config_error() {
        let io = MemoryIo::default().with_table("a.csv", json!([{"k": 1}]));
        let (executor, _io, _sink, run) = setup(io);
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("a", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(GraphNode::source("b", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(GraphNode::source("c", "CSV_SOURCE").with("file_path", "a.csv"))
            .with_node(
                GraphNode::transform("j", "JOIN")
                    .with("join_type", "inner")
                    .with("left_on", "k")
                    .with("right_on", "k"),
            )
            .with_edge("a", "j")
            .with_edge("b", "j")
            .with_edge("c", "j");

        let error = executor.execute(&graph, &run).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
        assert!(error.to_string().contains("JOIN takes two inputs but has 3 inbound edges"));
    }

    #[test]
    fn test_execute_json_invalid_definition() {
        let (executor, _io, sink, run) = setup(orders());
        let error = executor.execute_json("{not json", &run).unwrap_err();
        assert!(matches!(error, EngineError::Graph(GraphError::InvalidDefinition(_))));
        assert!(sink.records()[0].node_id.is_none());
    }

    #[test]
    fn test_first_edge_wins_for_single_input() {
        let io = orders().with_table("other.csv", json!([{"id": 9, "amt": 1}]));
        let (executor, io, _sink, run) = setup(io);
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s1", "CSV_SOURCE").with("file_path", "orders.csv"))
            .with_node(GraphNode::source("s2", "CSV_SOURCE").with("file_path", "other.csv"))
            .with_node(GraphNode::sink("l", "CSV_LOAD"))
            .with_edge("s1", "l")
            .with_edge("s2", "l");

        executor.execute(&graph, &run).unwrap();
        assert_eq!(io.written.lock()[0].1.row_count(), 3);
    }
}
