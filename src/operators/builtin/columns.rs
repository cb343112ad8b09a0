//! Column-shaping operators: projection, renaming, casting, splitting and merging.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::dataset::Dataset;
use crate::core::error::{DatasetError, ExecutionResult};
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::types::{DataType, Value};
use crate::operators::registry::OperatorRegistry;
use serde_json::Value as JsonValue;

/// Register column operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(Select));
    registry.register(|| Box::new(Rename));
    registry.register(|| Box::new(Cast));
    registry.register(|| Box::new(SplitColumn));
    registry.register(|| Box::new(MergeColumns));
}

fn list(config: &NodeConfig, key: &str) -> Vec<String> {
    config.string_list(key).unwrap_or_default()
}

fn column_list(config: &NodeConfig, key: &str) -> ColumnRequirements {
    ColumnRequirements::primary(list(config, key))
}

/// Keep the listed columns, in the listed order.
#[derive(Debug, Clone)]
pub struct Select;

impl Operator for Select {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("SELECT", "Select Columns")
            .description("Keep only the listed columns")
            .requires("columns")
            .tags(["columns", "projection"])
            .build()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        column_list(config, "columns")
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let columns = ctx.get_string_list("columns")?;
        let indices = columns
            .iter()
            .map(|name| ctx.column_index(input, name))
            .collect::<ExecutionResult<Vec<_>>>()?;

        let rows = input
            .rows()
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        let data = Dataset::new(columns, rows).map_err(|e| ctx.dataset_error(e))?;
        let message = format!("Selected {} columns", data.column_count());
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Rename columns through an `{old: new}` mapping.
#[derive(Debug, Clone)]
pub struct Rename;

impl Operator for Rename {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("RENAME", "Rename Columns")
            .description("Rename columns using an {old: new} mapping")
            .requires("mapping")
            .tags(["columns"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.get("mapping") {
            Some(JsonValue::Object(mapping)) => mapping
                .iter()
                .filter(|(_, new)| !new.is_string())
                .map(|(old, _)| format!("RENAME mapping for '{}' must be a string", old))
                .collect(),
            Some(JsonValue::Null) | None => Vec::new(),
            Some(_) => vec!["RENAME 'mapping' must be an object".to_string()],
        }
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        let keys = config
            .object("mapping")
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ColumnRequirements::primary(keys)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let mapping = ctx.get_object("mapping")?;

        let mut names = input.column_names();
        for (old, new) in mapping {
            let new = new
                .as_str()
                .ok_or_else(|| ctx.config_error(format!("mapping for '{}' must be a string", old)))?;
            let idx = ctx.column_index(input, old)?;
            names[idx] = new.to_string();
        }

        let data = Dataset::new(names, input.rows().to_vec()).map_err(|e| match e {
            DatasetError::DuplicateColumn(name) => {
                ctx.operator_error(format!("renaming would produce duplicate column '{}'", name))
            }
            other => ctx.dataset_error(other),
        })?;
        Ok(NodeOutput::dataset(data, format!("Renamed {} columns", mapping.len())))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CastSpec {
    column: String,
    target: String,
    format: Option<String>,
}

/// Either a `casts` list or a single `column` + `dtype`/`to`.
fn cast_specs(config: &NodeConfig) -> Result<Vec<CastSpec>, String> {
    fn target(entry: &serde_json::Map<String, JsonValue>) -> Option<String> {
        entry
            .get("to")
            .or_else(|| entry.get("dtype"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    match config.get("casts") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| -> Result<CastSpec, String> {
                let entry = item
                    .as_object()
                    .ok_or_else(|| format!("CAST entry {} must be an object", i))?;
                let column = entry
                    .get("column")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| format!("CAST entry {} requires 'column'", i))?;
                let target = target(entry).ok_or_else(|| format!("CAST entry {} requires 'to'", i))?;
                Ok(CastSpec {
                    column: column.to_string(),
                    target,
                    format: entry.get("format").and_then(JsonValue::as_str).map(str::to_string),
                })
            })
            .collect(),
        Some(JsonValue::Null) | None => {
            let column = config.str("column").ok_or("CAST requires 'column'")?;
            let target = target(config.as_map()).ok_or("CAST requires 'dtype'")?;
            Ok(vec![CastSpec {
                column: column.to_string(),
                target,
                format: config.str("format").map(str::to_string),
            }])
        }
        Some(_) => Err("CAST 'casts' must be a list".to_string()),
    }
}

/// Convert columns to another type. Unconvertible values become null.
#[derive(Debug, Clone)]
pub struct Cast;

impl Operator for Cast {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("CAST", "Cast Types")
            .description("Convert columns to int, float, string, datetime or bool")
            .requires_any(["casts", "column"])
            .tags(["columns", "types"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        if !config.is_set("casts") && !config.is_set("column") {
            return Vec::new();
        }
        match cast_specs(config) {
            Ok(specs) => specs
                .iter()
                .filter(|s| DataType::from_cast_name(&s.target).is_none())
                .map(|s| format!("CAST target type '{}' is not supported", s.target))
                .collect(),
            Err(message) => vec![message],
        }
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        let columns = cast_specs(config)
            .map(|specs| specs.into_iter().map(|s| s.column).collect())
            .unwrap_or_default();
        ColumnRequirements::primary(columns)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let specs = cast_specs(ctx.config()).map_err(|m| ctx.config_error(m))?;

        let mut data = input.clone();
        for spec in &specs {
            let dtype = DataType::from_cast_name(&spec.target).ok_or_else(|| {
                ctx.config_error(format!("CAST target type '{}' is not supported", spec.target))
            })?;
            let idx = ctx.column_index(&data, &spec.column)?;
            let values = data
                .column_values(idx)
                .map(|v| v.cast(dtype, spec.format.as_deref()))
                .collect();
            data = data
                .with_column(&spec.column, values)
                .map_err(|e| ctx.dataset_error(e))?;
        }
        Ok(NodeOutput::dataset(data, format!("Cast {} columns", specs.len())))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Split a text column on a delimiter into new columns.
#[derive(Debug, Clone)]
pub struct SplitColumn;

impl Operator for SplitColumn {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("SPLIT_COLUMN", "Split Column")
            .description("Split a column on a delimiter into several new columns")
            .requires("column")
            .requires("new_columns")
            .tags(["columns", "text"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.get("delimiter") {
            Some(JsonValue::String(d)) if d.is_empty() => {
                vec!["SPLIT_COLUMN 'delimiter' must not be empty".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        column_list(config, "column")
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let new_columns = ctx.get_string_list("new_columns")?;
        let delimiter = ctx.get_string_or("delimiter", ",")?;
        if delimiter.is_empty() {
            return Err(ctx.config_error("'delimiter' must not be empty"));
        }
        let idx = ctx.column_index(input, column)?;

        // non-string cells are split on their text form
        let parts: Vec<Vec<String>> = input
            .column_values(idx)
            .map(|v| {
                if v.is_null() {
                    Vec::new()
                } else {
                    v.to_text().split(delimiter).map(str::to_string).collect()
                }
            })
            .collect();

        let mut data = input.clone();
        for (position, name) in new_columns.iter().enumerate() {
            let values = parts
                .iter()
                .map(|split| {
                    split
                        .get(position)
                        .map(|p| Value::String(p.clone()))
                        .unwrap_or(Value::Null)
                })
                .collect();
            data = data.with_column(name, values).map_err(|e| ctx.dataset_error(e))?;
        }

        let message = format!("Split {} into {} columns", column, new_columns.len());
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Join the text of several columns into one new column.
#[derive(Debug, Clone)]
pub struct MergeColumns;

impl Operator for MergeColumns {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("MERGE_COLUMNS", "Merge Columns")
            .description("Concatenate columns into a new column with a separator")
            .requires("columns")
            .requires("new_column")
            .tags(["columns", "text"])
            .build()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        column_list(config, "columns")
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let columns = ctx.get_string_list("columns")?;
        let new_column = ctx.get_string("new_column")?;
        let separator = ctx.get_string_or("separator", " ")?;
        let indices = columns
            .iter()
            .map(|name| ctx.column_index(input, name))
            .collect::<ExecutionResult<Vec<_>>>()?;

        let values = input
            .rows()
            .iter()
            .map(|row| {
                let texts: Vec<String> = indices.iter().map(|&i| row[i].to_text()).collect();
                Value::String(texts.join(separator))
            })
            .collect();
        let data = input
            .with_column(new_column, values)
            .map_err(|e| ctx.dataset_error(e))?;

        let message = format!("Merged {} columns into {}", columns.len(), new_column);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}
