//! Core types and traits for the etlgraph pipeline engine.
//!
//! This module contains the foundational types that flow through a pipeline
//! including:
//! - Cell values and column types
//! - Datasets and column profiles
//! - Operator traits and metadata
//! - Error types
//! - Node configuration and execution contexts

pub mod types;
pub mod dataset;
pub mod stats;
pub mod error;
pub mod context;
pub mod node;

// Re-export commonly used types
pub use types::{Value, DataType, ValueKey};
pub use dataset::{Column, Dataset, DatasetProfile};
pub use error::{EngineError, GraphError, ExecutionError, IoError, NodeId, ValidationResult};
pub use context::{ExecutionContext, NodeConfig};
pub use node::{Category, ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
