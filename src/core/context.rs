//! Node configuration and execution context.
//!
//! [`NodeConfig`] holds a node's settings exactly as they arrived on the
//! wire. [`ExecutionContext`] is what an operator sees while it runs: its
//! configuration, its resolved inputs and the I/O provider, with getters
//! that turn bad configuration into errors naming the node.

use crate::core::dataset::Dataset;
use crate::core::error::{DatasetError, ExecutionError, ExecutionResult, IoError, NodeId};
use crate::io::TabularIo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Settings of one node, an ordered map of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeConfig(Map<String, JsonValue>);

impl NodeConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value. Anything but an object yields an empty config.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Set a key, returning the updated configuration.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Check if a key is present, whatever its value.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Check if a key is present with a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.0.get(key).map(is_truthy).unwrap_or(false)
    }

    /// Get a string value.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    /// Get a list of strings. A single string counts as a one-element list.
    pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key)? {
            JsonValue::String(s) => Some(vec![s.clone()]),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Get a number. Numeric strings are accepted.
    pub fn f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get a boolean.
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(JsonValue::as_bool)
    }

    /// Get a nested object.
    pub fn object(&self, key: &str) -> Option<&Map<String, JsonValue>> {
        self.0.get(key).and_then(JsonValue::as_object)
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }
}

impl From<Map<String, JsonValue>> for NodeConfig {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

/// JSON truthiness: null, false, zero and empty strings, arrays or objects are empty.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

/// Context provided to an operator for one node invocation.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// ID of the node being executed.
    pub node_id: &'a NodeId,
    /// Operator kind of the node.
    pub kind: &'a str,
    config: &'a NodeConfig,
    input: Option<&'a Dataset>,
    secondary: Option<&'a Dataset>,
    io: Option<&'a dyn TabularIo>,
    default_output_name: &'a str,
}

impl<'a> ExecutionContext<'a> {
    /// Create a context with no inputs and no I/O provider.
    pub fn new(node_id: &'a NodeId, kind: &'a str, config: &'a NodeConfig) -> Self {
        Self {
            node_id,
            kind,
            config,
            input: None,
            secondary: None,
            io: None,
            default_output_name: "output",
        }
    }

    /// Attach the primary input.
    pub fn with_input(mut self, input: &'a Dataset) -> Self {
        self.input = Some(input);
        self
    }

    /// Attach the secondary (right-hand) input.
    pub fn with_secondary(mut self, secondary: &'a Dataset) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Attach the I/O provider.
    pub fn with_io(mut self, io: &'a dyn TabularIo) -> Self {
        self.io = Some(io);
        self
    }

    /// Set the base name used by sinks without an explicit output path.
    pub fn with_default_output_name(mut self, name: &'a str) -> Self {
        self.default_output_name = name;
        self
    }

    /// Get the node configuration.
    pub fn config(&self) -> &'a NodeConfig {
        self.config
    }

    /// Get the primary input.
    pub fn input(&self) -> ExecutionResult<&'a Dataset> {
        self.input.ok_or_else(|| ExecutionError::NoInput {
            node_id: self.node_id.clone(),
            reason: "no upstream dataset was provided".to_string(),
        })
    }

    /// Get the secondary input, if one was resolved.
    pub fn secondary_input(&self) -> Option<&'a Dataset> {
        self.secondary
    }

    /// Get the I/O provider.
    pub fn io(&self) -> ExecutionResult<&'a dyn TabularIo> {
        self.io
            .ok_or_else(|| self.operator_error("no I/O provider is available"))
    }

    /// Base name for sink outputs without an explicit path.
    pub fn default_output_name(&self) -> &'a str {
        self.default_output_name
    }

    // ========================================================================
    // Configuration Getters
    // ========================================================================

    /// Get a required configuration value.
    pub fn get_value(&self, key: &str) -> ExecutionResult<&'a JsonValue> {
        self.config
            .get(key)
            .ok_or_else(|| self.config_error(format!("{} requires '{}'", self.kind, key)))
    }

    /// Get a required, non-empty string.
    pub fn get_string(&self, key: &str) -> ExecutionResult<&'a str> {
        match self.get_value(key)? {
            JsonValue::String(s) if !s.is_empty() => Ok(s.as_str()),
            JsonValue::String(_) => Err(self.config_error(format!("'{}' must not be empty", key))),
            _ => Err(self.config_error(format!("'{}' must be a string", key))),
        }
    }

    /// Get an optional string, falling back to `default` when absent or null.
    pub fn get_string_or(&self, key: &str, default: &'a str) -> ExecutionResult<&'a str> {
        match self.config.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(JsonValue::String(s)) => Ok(s.as_str()),
            Some(_) => Err(self.config_error(format!("'{}' must be a string", key))),
        }
    }

    /// Get a required, non-empty list of column names.
    pub fn get_string_list(&self, key: &str) -> ExecutionResult<Vec<String>> {
        self.get_value(key)?;
        match self.get_optional_string_list(key)? {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(self.config_error(format!("'{}' must not be empty", key))),
        }
    }

    /// Get an optional list of strings.
    pub fn get_optional_string_list(&self, key: &str) -> ExecutionResult<Option<Vec<String>>> {
        match self.config.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(_) => self.config.string_list(key).map(Some).ok_or_else(|| {
                self.config_error(format!("'{}' must be a string or a list of strings", key))
            }),
        }
    }

    /// Get an optional number, falling back to `default`.
    pub fn get_float_or(&self, key: &str, default: f64) -> ExecutionResult<f64> {
        match self.config.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(_) => self
                .config
                .f64(key)
                .ok_or_else(|| self.config_error(format!("'{}' must be a number", key))),
        }
    }

    /// Get an optional boolean, falling back to `default`.
    pub fn get_bool_or(&self, key: &str, default: bool) -> ExecutionResult<bool> {
        match self.config.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(JsonValue::Bool(b)) => Ok(*b),
            Some(_) => Err(self.config_error(format!("'{}' must be true or false", key))),
        }
    }

    /// Get a required JSON object.
    pub fn get_object(&self, key: &str) -> ExecutionResult<&'a Map<String, JsonValue>> {
        self.get_value(key)?
            .as_object()
            .ok_or_else(|| self.config_error(format!("'{}' must be an object", key)))
    }

    /// Resolve a column of `data`, failing with a schema error.
    pub fn column_index(&self, data: &Dataset, name: &str) -> ExecutionResult<usize> {
        data.column_index(name)
            .ok_or_else(|| self.schema_error(vec![name.to_string()], data))
    }

    // ========================================================================
    // Error Constructors
    // ========================================================================

    /// Configuration error for this node.
    pub fn config_error(&self, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Config {
            node_id: self.node_id.clone(),
            message: message.into(),
        }
    }

    /// Operator failure for this node.
    pub fn operator_error(&self, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Operator {
            node_id: self.node_id.clone(),
            message: message.into(),
        }
    }

    /// Schema error listing what `data` actually has.
    pub fn schema_error(&self, missing: Vec<String>, data: &Dataset) -> ExecutionError {
        ExecutionError::Schema {
            node_id: self.node_id.clone(),
            missing,
            available: data.column_names(),
        }
    }

    /// Provider failure for this node.
    pub fn io_error(&self, source: IoError) -> ExecutionError {
        ExecutionError::Io {
            node_id: self.node_id.clone(),
            source,
        }
    }

    /// Wrap a dataset construction failure as an operator error.
    pub fn dataset_error(&self, error: DatasetError) -> ExecutionError {
        self.operator_error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NodeConfig {
        NodeConfig::from_json(json!({
            "column": "amount",
            "columns": ["a", "b"],
            "single": "a",
            "empty": "",
            "threshold": "2.5",
            "flag": true,
            "value": 0
        }))
    }

    #[test]
    fn test_truthiness() {
        let config = config();
        assert!(config.is_set("column"));
        assert!(!config.is_set("empty"));
        assert!(!config.is_set("value"));
        assert!(config.contains("value"));
        assert!(!config.is_set("missing"));
    }

    #[test]
    fn test_string_lists() {
        let config = config();
        assert_eq!(config.string_list("columns"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(config.string_list("single"), Some(vec!["a".to_string()]));
        assert_eq!(config.string_list("flag"), None);
    }

    #[test]
    fn test_context_getters() {
        let id = NodeId::from("n1");
        let config = config();
        let ctx = ExecutionContext::new(&id, "FILTER", &config);

        assert_eq!(ctx.get_string("column").unwrap(), "amount");
        assert_eq!(ctx.get_float_or("threshold", 3.0).unwrap(), 2.5);
        assert_eq!(ctx.get_float_or("absent", 3.0).unwrap(), 3.0);
        assert!(ctx.get_bool_or("flag", false).unwrap());
        assert_eq!(ctx.get_string_or("absent", ",").unwrap(), ",");
    }

    #[test]
    fn test_context_errors_name_the_node() {
        let id = NodeId::from("n1");
        let config = config();
        let ctx = ExecutionContext::new(&id, "FILTER", &config);

        let error = ctx.get_string("operator").unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
        assert!(error.to_string().contains("n1"));
        assert!(error.to_string().contains("'operator'"));

        assert!(ctx.get_string("empty").is_err());
        assert!(ctx.get_bool_or("column", false).is_err());
        assert_eq!(ctx.input().unwrap_err().kind(), "NoInputError");
        assert_eq!(ctx.io().err().map(|e| e.kind()), Some("OperatorError"));
    }
}
