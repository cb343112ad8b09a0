//! Validation pipeline implementation.

use crate::core::error::ValidationResult;
use crate::graph::structure::PipelineGraph;
use crate::operators::registry::OperatorRegistry;
use crate::validation::stages::{
    ConfigValidation, ConnectivityValidation, CycleValidation, EdgeValidation,
    IdentityValidation, StructureValidation, ValidationStage,
};
use std::sync::Arc;
use std::time::Instant;

/// Multi-stage validation pipeline.
///
/// Runs every stage on a graph and accumulates their errors; no stage stops
/// the others. The only short circuit is an empty graph, which yields a
/// single error.
pub struct ValidationPipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl ValidationPipeline {
    /// Create a new pipeline with the given stages.
    pub fn new(stages: Vec<Box<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// Create the standard pipeline checking configuration against `registry`.
    pub fn default_pipeline(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            stages: vec![
                Box::new(CycleValidation),
                Box::new(ConnectivityValidation),
                Box::new(ConfigValidation::new(registry)),
                Box::new(EdgeValidation),
                Box::new(StructureValidation),
                Box::new(IdentityValidation),
            ],
        }
    }

    /// Create the standard pipeline over the built-in operator catalog.
    pub fn with_builtins() -> Self {
        Self::default_pipeline(Arc::new(OperatorRegistry::with_builtins()))
    }

    /// Add a custom validation stage.
    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    /// Names of the stages, in run order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Validate a graph through all stages.
    pub fn validate(&self, graph: &PipelineGraph) -> ValidationResult {
        if graph.is_empty() {
            return ValidationResult::failed("Pipeline must contain at least one node");
        }

        let start = Instant::now();
        let mut result = ValidationResult::new();
        for stage in &self.stages {
            if let Err(errors) = stage.validate(graph) {
                log::debug!("{} found {} problem(s)", stage.name(), errors.len());
                result.extend(errors);
            }
        }
        log::debug!(
            "validated {} nodes in {:?}: {}",
            graph.node_count(),
            start.elapsed(),
            result.summary()
        );
        result
    }

    /// Validate a definition in wire JSON.
    ///
    /// A definition that does not parse is reported as a single error.
    pub fn validate_json(&self, json: &str) -> ValidationResult {
        match PipelineGraph::from_json(json) {
            Ok(graph) => self.validate(&graph),
            Err(e) => ValidationResult::failed(format!("Invalid pipeline definition: {}", e)),
        }
    }

    /// Quick validation - just check if the graph can be executed.
    pub fn can_execute(&self, graph: &PipelineGraph) -> bool {
        self.validate(graph).is_valid
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::with_builtins()
    }
}
