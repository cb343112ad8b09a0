//! Error types for etlgraph.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the node at fault so a failed run is attributable
//! - Carry the columns or keys involved so the message is actionable
//! - Chain the underlying provider error for I/O failures

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Identifier of a node within one pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Top-level error type for etlgraph.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to graph structure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphError {
    #[error("Pipeline contains cycles - cannot execute (unresolved nodes: {})", join_ids(.nodes))]
    CycleDetected { nodes: Vec<NodeId> },

    #[error("Node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("Duplicate node id '{0}'")]
    DuplicateNode(NodeId),

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),
}

/// Errors raised while a run executes a node.
///
/// Every variant names the node that failed. The taxonomy names used in
/// records and user-facing status come from [`ExecutionError::kind`].
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Node '{node_id}': {message}")]
    Config { node_id: NodeId, message: String },

    #[error(
        "Node '{node_id}': column(s) not found: {}. Available columns: {}",
        .missing.join(", "),
        .available.join(", ")
    )]
    Schema {
        node_id: NodeId,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Node '{node_id}' has no input: {reason}")]
    NoInput { node_id: NodeId, reason: String },

    #[error("Node '{node_id}': {message}")]
    Operator { node_id: NodeId, message: String },

    #[error("Node '{node_id}': {source}")]
    Io {
        node_id: NodeId,
        #[source]
        source: IoError,
    },
}

/// Errors from the tabular I/O provider.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file path: directory traversal detected ({0})")]
    PathTraversal(String),

    #[error("File type not allowed: {path} (allowed: {allowed})")]
    ExtensionNotAllowed { path: String, allowed: String },

    #[error("{format} {operation} is not supported by this provider")]
    UnsupportedFormat { format: String, operation: String },

    #[error("Unsupported encoding '{0}', only utf-8 is available")]
    UnsupportedEncoding(String),

    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Error reading CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Error handling JSON data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Invalid data: {0}")]
    Data(#[from] DatasetError),

    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),
}

/// Errors from building or reshaping a dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Record {index} is not an object")]
    InvalidRecord { index: usize },
}

/// Errors loading engine settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Error Utilities
// ============================================================================

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

impl ExecutionError {
    /// Get the node ID that caused this error.
    pub fn node_id(&self) -> &NodeId {
        match self {
            ExecutionError::Config { node_id, .. }
            | ExecutionError::Schema { node_id, .. }
            | ExecutionError::NoInput { node_id, .. }
            | ExecutionError::Operator { node_id, .. }
            | ExecutionError::Io { node_id, .. } => node_id,
        }
    }

    /// Taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Config { .. } => "ConfigError",
            ExecutionError::Schema { .. } => "SchemaError",
            ExecutionError::NoInput { .. } => "NoInputError",
            ExecutionError::Operator { .. } => "OperatorError",
            ExecutionError::Io { .. } => "IOError",
        }
    }

    /// Get a suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ExecutionError::Schema { missing, .. } => Some(format!(
                "Check upstream nodes produce column(s) {}",
                missing.join(", ")
            )),
            ExecutionError::NoInput { .. } => {
                Some("Connect an upstream node to this node".to_string())
            }
            ExecutionError::Io {
                source: IoError::NotFound(path),
                ..
            } => Some(format!("Check that the file '{}' exists", path)),
            _ => None,
        }
    }
}

impl GraphError {
    /// Graph errors always prevent execution.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl EngineError {
    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            EngineError::Execution(error) => Some(error.node_id()),
            EngineError::Graph(GraphError::NodeNotFound(id))
            | EngineError::Graph(GraphError::DuplicateNode(id)) => Some(id),
            _ => None,
        }
    }

    /// Taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Graph(GraphError::CycleDetected { .. }) => "CycleError",
            EngineError::Graph(_) => "GraphError",
            EngineError::Execution(error) => error.kind(),
            EngineError::Settings(_) => "SettingsError",
            EngineError::Io(_) => "IOError",
            EngineError::Serialization(_) => "SerializationError",
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for node execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Result type alias for provider calls.
pub type IoResult<T> = Result<T, IoError>;

// ============================================================================
// Validation Result
// ============================================================================

/// Verdict of static graph validation.
///
/// Serializes as `{"valid": bool, "errors": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether no check produced an error.
    #[serde(rename = "valid")]
    pub is_valid: bool,
    /// Human-readable violations, in check order.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Create a new passing result.
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// Create a failing result with a single error.
    pub fn failed(error: impl Into<String>) -> Self {
        let mut result = Self::new();
        result.add_error(error);
        result
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    /// Add several errors at once.
    pub fn extend<I, S>(&mut self, errors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for error in errors {
            self.add_error(error);
        }
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.is_valid {
            "✓ Pipeline is valid and ready to execute".to_string()
        } else {
            format!("✗ Validation failed with {} error(s)", self.errors.len())
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}
