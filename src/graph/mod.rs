//! Graph module for pipeline definitions.
//!
//! A pipeline is a directed graph where nodes are source, transform and
//! sink operators and edges carry datasets between them. A runnable
//! pipeline is acyclic.

pub mod structure;
pub mod connection;
pub mod topology;
pub mod serialization;

// Re-export commonly used types
pub use structure::{GraphNode, NodeRole, PipelineGraph};
pub use connection::{split_inputs, Edge, InputPort};
pub use topology::{topological_order, TopologyAnalyzer};
pub use serialization::{SerializedEdge, SerializedGraph, SerializedNode};
