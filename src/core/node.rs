//! Operator trait and operator metadata.
//!
//! Every node kind (source, transform or sink) is implemented by an
//! [`Operator`]. Operators are looked up by kind in the registry, checked
//! statically through their metadata and [`Operator::validate_config`], and
//! run against resolved inputs through [`Operator::execute`].

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::dataset::Dataset;
use crate::core::error::ExecutionResult;
use serde::{Deserialize, Serialize};

/// Role an operator plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Produces a dataset from external storage
    Source,
    /// Derives a dataset from one or more inputs
    Transform,
    /// Persists a dataset to external storage
    Sink,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Source => "Source",
            Category::Transform => "Transform",
            Category::Sink => "Sink",
        }
    }

    /// Node role string used on the wire.
    pub fn wire_role(&self) -> &'static str {
        match self {
            Category::Source => "SOURCE",
            Category::Transform => "TRANSFORM",
            Category::Sink => "LOAD",
        }
    }

    /// Get all categories in pipeline order.
    pub fn all() -> &'static [Category] {
        &[Category::Source, Category::Transform, Category::Sink]
    }
}

/// A configuration key an operator cannot run without.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "keys", rename_all = "snake_case")]
pub enum ConfigRequirement {
    /// Key must be present with a non-empty value
    NonEmpty(String),
    /// Key must be present; any value, even an empty one, is accepted
    Present(String),
    /// At least one of the keys must be present and non-empty
    AnyOf(Vec<String>),
}

impl ConfigRequirement {
    /// Check the requirement, describing what is missing.
    pub fn check(&self, kind: &str, config: &NodeConfig) -> Option<String> {
        match self {
            ConfigRequirement::NonEmpty(key) if !config.is_set(key) => {
                Some(format!("{} requires '{}'", kind, key))
            }
            ConfigRequirement::Present(key) if !config.contains(key) => {
                Some(format!("{} requires '{}'", kind, key))
            }
            ConfigRequirement::AnyOf(keys) if !keys.iter().any(|k| config.is_set(k)) => {
                let quoted: Vec<String> = keys.iter().map(|k| format!("'{}'", k)).collect();
                Some(format!("{} requires {}", kind, quoted.join(" or ")))
            }
            _ => None,
        }
    }
}

/// Columns an operator reads from its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRequirements {
    /// Columns read from the primary input
    pub primary: Vec<String>,
    /// Columns read from the secondary input
    pub secondary: Vec<String>,
}

impl ColumnRequirements {
    /// No column requirements.
    pub fn none() -> Self {
        Self::default()
    }

    /// Requirements on the primary input only.
    pub fn primary(columns: Vec<String>) -> Self {
        Self {
            primary: columns,
            secondary: Vec::new(),
        }
    }
}

/// Metadata describing an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorMetadata {
    /// Operator kind tag (e.g., "FILTER")
    pub kind: String,
    /// Human-readable name (e.g., "Filter Rows")
    pub name: String,
    /// Role in the pipeline
    pub category: Category,
    /// Detailed description
    pub description: String,
    /// Keys checked statically by the validator
    pub requirements: Vec<ConfigRequirement>,
    /// Whether the operator consumes a secondary input
    pub multi_input: bool,
    /// Searchable tags
    pub tags: Vec<String>,
}

impl OperatorMetadata {
    /// Create a new metadata builder.
    pub fn builder(kind: impl Into<String>, name: impl Into<String>) -> OperatorMetadataBuilder {
        OperatorMetadataBuilder::new(kind, name)
    }

    /// Names of every key mentioned by a requirement.
    pub fn required_keys(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .flat_map(|r| match r {
                ConfigRequirement::NonEmpty(key) | ConfigRequirement::Present(key) => {
                    vec![key.as_str()]
                }
                ConfigRequirement::AnyOf(keys) => keys.iter().map(String::as_str).collect(),
            })
            .collect()
    }
}

/// Builder for operator metadata.
pub struct OperatorMetadataBuilder {
    kind: String,
    name: String,
    category: Category,
    description: String,
    requirements: Vec<ConfigRequirement>,
    multi_input: bool,
    tags: Vec<String>,
}

impl OperatorMetadataBuilder {
    /// Create a new builder. The category defaults to transform.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            category: Category::Transform,
            description: String::new(),
            requirements: Vec::new(),
            multi_input: false,
            tags: Vec::new(),
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require a non-empty key.
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(ConfigRequirement::NonEmpty(key.into()));
        self
    }

    /// Require a key to be present, allowing empty values.
    pub fn requires_present(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(ConfigRequirement::Present(key.into()));
        self
    }

    /// Require at least one of several keys.
    pub fn requires_any<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .push(ConfigRequirement::AnyOf(keys.into_iter().map(Into::into).collect()));
        self
    }

    /// Mark the operator as consuming a secondary input.
    pub fn multi_input(mut self) -> Self {
        self.multi_input = true;
        self
    }

    /// Add tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Build the metadata.
    pub fn build(self) -> OperatorMetadata {
        OperatorMetadata {
            kind: self.kind,
            name: self.name,
            category: self.category,
            description: self.description,
            requirements: self.requirements,
            multi_input: self.multi_input,
            tags: self.tags,
        }
    }
}

/// What a node produced.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// A dataset for downstream nodes
    Dataset {
        /// The produced dataset
        data: Dataset,
        /// Record message
        message: String,
    },
    /// A dataset persisted by a sink
    Written {
        /// Final location reported by the provider
        location: String,
        /// Record message
        message: String,
    },
}

impl NodeOutput {
    /// Wrap a produced dataset.
    pub fn dataset(data: Dataset, message: impl Into<String>) -> Self {
        NodeOutput::Dataset {
            data,
            message: message.into(),
        }
    }

    /// Wrap a sink location.
    pub fn written(location: impl Into<String>, message: impl Into<String>) -> Self {
        NodeOutput::Written {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Get the record message.
    pub fn message(&self) -> &str {
        match self {
            NodeOutput::Dataset { message, .. } | NodeOutput::Written { message, .. } => message,
        }
    }
}

/// The core trait for pipeline operators.
///
/// # Design
///
/// Operators are stateless. Checking happens in two phases:
///
/// 1. **Static** ([`metadata`](Operator::metadata) requirements and
///    [`validate_config`](Operator::validate_config)): run by the validator
///    on configuration alone, before any data exists.
///
/// 2. **Runtime** ([`required_columns`](Operator::required_columns)): the
///    executor checks the named columns against the actual resolved inputs
///    just before [`execute`](Operator::execute) runs.
///
/// # Example Implementation
///
/// ```ignore
/// struct DropColumn;
///
/// impl Operator for DropColumn {
///     fn metadata(&self) -> OperatorMetadata {
///         OperatorMetadata::builder("DROP_COLUMN", "Drop Column")
///             .description("Remove one column")
///             .requires("column")
///             .build()
///     }
///
///     fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
///         ColumnRequirements::primary(config.string_list("column").unwrap_or_default())
///     }
///
///     fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
///         let input = ctx.input()?;
///         let column = ctx.get_string("column")?;
///         // build the projected dataset...
///     }
///
///     fn clone_box(&self) -> Box<dyn Operator> {
///         Box::new(DropColumn)
///     }
/// }
/// ```
pub trait Operator: Send + Sync {
    /// Get the metadata for this operator.
    ///
    /// This is called during registration and should return consistent values.
    fn metadata(&self) -> OperatorMetadata;

    /// Operator-specific static checks beyond the required keys.
    ///
    /// Returned messages describe the problem without naming the node.
    fn validate_config(&self, _config: &NodeConfig) -> Vec<String> {
        Vec::new()
    }

    /// Columns this configuration reads from the inputs.
    fn required_columns(&self, _config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::none()
    }

    /// Run the operator.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput>;

    /// Clone this operator into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Operator>;
}

impl Clone for Box<dyn Operator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_builder() {
        let metadata = OperatorMetadata::builder("JOIN", "Join")
            .description("Relational join")
            .requires("join_type")
            .requires_present("value")
            .requires_any(["table_name", "query"])
            .multi_input()
            .tags(["relational"])
            .build();

        assert_eq!(metadata.kind, "JOIN");
        assert_eq!(metadata.category, Category::Transform);
        assert!(metadata.multi_input);
        assert_eq!(metadata.requirements.len(), 3);
        assert_eq!(metadata.required_keys(), vec!["join_type", "value", "table_name", "query"]);
    }

    #[test]
    fn test_requirement_checks() {
        let config = NodeConfig::from_json(json!({"value": "", "column": "", "query": "SELECT 1"}));

        let present = ConfigRequirement::Present("value".to_string());
        assert_eq!(present.check("FILTER", &config), None);

        let non_empty = ConfigRequirement::NonEmpty("column".to_string());
        assert_eq!(
            non_empty.check("FILTER", &config),
            Some("FILTER requires 'column'".to_string())
        );

        let any = ConfigRequirement::AnyOf(vec!["table_name".to_string(), "query".to_string()]);
        assert_eq!(any.check("DB_SOURCE", &config), None);

        let empty = NodeConfig::new();
        assert_eq!(
            any.check("DB_SOURCE", &empty),
            Some("DB_SOURCE requires 'table_name' or 'query'".to_string())
        );
    }

    #[test]
    fn test_category_roles() {
        assert_eq!(Category::Sink.wire_role(), "LOAD");
        assert_eq!(Category::Source.display_name(), "Source");
        assert_eq!(Category::all().len(), 3);
    }
}
