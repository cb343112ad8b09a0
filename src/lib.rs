//! # Etlgraph - Declarative ETL Pipelines
//!
//! Etlgraph runs ETL pipelines described as directed acyclic graphs of
//! source, transform and sink nodes over in-memory tables.
//!
//! ## Features
//!
//! - **Static Validation**: Check a definition for cycles, dangling nodes, bad edges and missing configuration before running it
//! - **Deterministic Execution**: Nodes run one at a time in a stable topological order
//! - **Operator Catalog**: Selection, filtering, casting, aggregation, joins, cleaning and binning built in
//! - **Pluggable I/O**: Every source and sink goes through a [`io::TabularIo`] provider
//! - **Execution Records**: Every attempted node leaves exactly one record in the run's log sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlgraph::prelude::*;
//! use std::sync::Arc;
//!
//! let graph = PipelineGraph::new()
//!     .with_node(GraphNode::source("s", "CSV_SOURCE").with("file_path", "orders.csv"))
//!     .with_node(
//!         GraphNode::transform("t", "FILTER")
//!             .with("column", "amt")
//!             .with("operator", ">")
//!             .with("value", 0),
//!     )
//!     .with_node(GraphNode::sink("l", "CSV_LOAD"))
//!     .with_edge("s", "t")
//!     .with_edge("t", "l");
//!
//! // Validate
//! let report = ValidationPipeline::default().validate(&graph);
//! assert!(report.is_valid, "{}", report.summary());
//!
//! // Execute
//! let executor = PipelineExecutor::with_builtins(Arc::new(LocalIo::default()));
//! let run = RunContext::generate(Arc::new(LogFacadeSink));
//! let outcome = executor.execute(&graph, &run)?;
//! println!("wrote {:?}", outcome.final_location);
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`core`]: Values, datasets, operator traits and error handling
//! - [`graph`]: Graph structure, wire format and topology analysis
//! - [`validation`]: Multi-stage validation pipeline and runtime schema checks
//! - [`operators`]: Operator registry and built-in operators
//! - [`io`]: Tabular I/O providers
//! - [`execution`]: Pipeline executor and execution records
//! - [`config`]: Engine settings
//!
//! ## Creating Custom Operators
//!
//! Implement the [`core::node::Operator`] trait and register it:
//!
//! ```rust,ignore
//! use etlgraph::prelude::*;
//!
//! #[derive(Clone)]
//! struct Head;
//!
//! impl Operator for Head {
//!     fn metadata(&self) -> OperatorMetadata {
//!         OperatorMetadata::builder("HEAD", "Head")
//!             .description("Keep the first rows")
//!             .build()
//!     }
//!
//!     fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
//!         let input = ctx.input()?;
//!         let n = ctx.get_float_or("n", 10.0)? as usize;
//!         Ok(NodeOutput::dataset(input.head(n), format!("Kept {} rows", n)))
//!     }
//!
//!     fn clone_box(&self) -> Box<dyn Operator> {
//!         Box::new(self.clone())
//!     }
//! }
//!
//! let mut registry = OperatorRegistry::with_builtins();
//! registry.register(|| Box::new(Head));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod execution;
pub mod graph;
pub mod io;
pub mod operators;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use etlgraph::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::dataset::{Column, Dataset, DatasetProfile};
    pub use crate::core::types::{DataType, Value};

    // Operator traits and contexts
    pub use crate::core::context::{ExecutionContext, NodeConfig};
    pub use crate::core::node::{Category, ColumnRequirements, NodeOutput, Operator, OperatorMetadata};

    // Errors
    pub use crate::core::error::{
        EngineError, ExecutionError, ExecutionResult, GraphError, IoError, NodeId, ValidationResult,
    };

    // Graph
    pub use crate::graph::connection::Edge;
    pub use crate::graph::structure::{GraphNode, NodeRole, PipelineGraph};
    pub use crate::graph::topology::{topological_order, TopologyAnalyzer};

    // Validation
    pub use crate::validation::pipeline::ValidationPipeline;
    pub use crate::validation::stages::ValidationStage;

    // Operators and I/O
    pub use crate::io::{DataFormat, LocalIo, TabularIo};
    pub use crate::operators::registry::OperatorRegistry;

    // Execution
    pub use crate::execution::engine::{ExecutionOutcome, ExecutionStats, PipelineExecutor, RunContext};
    pub use crate::execution::record::{
        ExecutionRecord, JsonLinesSink, LogFacadeSink, LogSink, MemoryLogSink, Severity,
    };

    // Settings
    pub use crate::config::{EngineSettings, IoSettings};
}

/// Validate a wire JSON pipeline definition against the built-in operators.
pub fn validate(definition: &str) -> core::error::ValidationResult {
    validation::ValidationPipeline::with_builtins().validate_json(definition)
}

/// Run a wire JSON pipeline definition with the built-in operators.
///
/// `run` carries the run ID, the default output name and the record sink.
/// Returns the location written by the last sink, or `None` when the
/// pipeline has no sink.
pub fn execute(
    definition: &str,
    io: std::sync::Arc<dyn io::TabularIo>,
    run: &execution::RunContext,
) -> core::error::EngineResult<Option<String>> {
    let outcome = execution::PipelineExecutor::with_builtins(io).execute_json(definition, run)?;
    Ok(outcome.final_location)
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "etlgraph");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let result = super::validate(
            r#"{"nodes": [{"id": "t", "type": "TRANSFORM", "subtype": "SORT", "config": {}}], "edges": []}"#,
        );
        assert!(!result.is_valid);
        assert!(result.errors.contains(&"Transform node 't' has no incoming connections".to_string()));
        assert!(result.errors.contains(&"Node 't': SORT requires 'columns'".to_string()));
    }

    #[test]
    fn test_prelude_builds_a_pipeline() {
        let graph = PipelineGraph::new()
            .with_node(GraphNode::source("s", "CSV_SOURCE").with("file_path", "in.csv"))
            .with_node(GraphNode::sink("l", "CSV_SINK"))
            .with_edge("s", "l");
        assert!(ValidationPipeline::default().can_execute(&graph));
        assert_eq!(topological_order(graph.nodes(), graph.edges()).unwrap().len(), 2);
    }
}
