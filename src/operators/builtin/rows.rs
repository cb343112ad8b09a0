//! Row-level operators: filtering, sorting and de-duplication.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::types::{parse_bool, parse_datetime, DataType, Value, ValueKey};
use crate::operators::builtin::join_names;
use crate::operators::registry::OperatorRegistry;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;

/// Register row operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(Filter));
    registry.register(|| Box::new(Sort));
    registry.register(|| Box::new(DropDuplicates));
}

// ============================================================================
// Filter
// ============================================================================

/// Comparison applied by [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
}

impl FilterOp {
    const ALL: &'static [&'static str] = &["==", "!=", ">", "<", ">=", "<=", "contains"];

    fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "==" => Some(FilterOp::Eq),
            "!=" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            "<" => Some(FilterOp::Lt),
            ">=" => Some(FilterOp::Ge),
            "<=" => Some(FilterOp::Le),
            "contains" => Some(FilterOp::Contains),
            _ => None,
        }
    }

    /// Whether `cell` passes, `None` when the two cannot be ordered.
    fn matches(self, cell: &Value, target: &Value) -> Option<bool> {
        match self {
            FilterOp::Contains => {
                Some(!cell.is_null() && cell.to_text().contains(&target.to_text()))
            }
            FilterOp::Eq => Some(cell.compare(target) == Some(Ordering::Equal)),
            FilterOp::Ne => Some(cell.compare(target) != Some(Ordering::Equal)),
            _ if cell.is_null() || target.is_null() => Some(false),
            op => {
                let ordering = cell.compare(target)?;
                Some(match op {
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Ge => ordering != Ordering::Less,
                    FilterOp::Le => ordering != Ordering::Greater,
                    _ => false,
                })
            }
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
            FilterOp::Ge => ">=",
            FilterOp::Le => "<=",
            FilterOp::Contains => "contains",
        };
        write!(f, "{}", text)
    }
}

/// Bring a configured value to the column's type, when it parses as one.
fn coerce_to(value: Value, dtype: DataType) -> Value {
    let text = match &value {
        Value::String(text) => text.clone(),
        _ => return value,
    };
    let coerced = match dtype {
        DataType::Integer | DataType::Float if text.contains('.') => {
            Value::parse_text(&text, DataType::Float)
        }
        DataType::Integer | DataType::Float => match Value::parse_text(&text, DataType::Integer) {
            Value::Null => Value::parse_text(&text, DataType::Float),
            parsed => parsed,
        },
        DataType::Boolean => parse_bool(&text).map(Value::Boolean).unwrap_or(Value::Null),
        DataType::DateTime => parse_datetime(text.trim(), None)
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    };
    if coerced.is_null() {
        value
    } else {
        coerced
    }
}

/// Keep rows where a column compares true against a value.
#[derive(Debug, Clone)]
pub struct Filter;

impl Operator for Filter {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("FILTER", "Filter Rows")
            .description("Keep rows where a column compares true against a value")
            .requires("column")
            .requires("operator")
            .requires_present("value")
            .tags(["rows", "predicate"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.str("operator") {
            Some(op) if !op.is_empty() && FilterOp::parse(op).is_none() => vec![format!(
                "FILTER operator '{}' is not supported (expected one of {})",
                op,
                FilterOp::ALL.join(", ")
            )],
            _ => Vec::new(),
        }
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::primary(config.string_list("column").unwrap_or_default())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let op_text = ctx.get_string("operator")?;
        let op = FilterOp::parse(op_text)
            .ok_or_else(|| ctx.config_error(format!("FILTER operator '{}' is not supported", op_text)))?;
        let configured = Value::from_json(ctx.get_value("value")?);
        let idx = ctx.column_index(input, column)?;
        let dtype = input.columns()[idx].dtype;
        let target = coerce_to(configured.clone(), dtype);

        let mut incompatible = None;
        let data = input.retain_rows(|row| match op.matches(&row[idx], &target) {
            Some(keep) => keep,
            None => {
                incompatible.get_or_insert_with(|| row[idx].data_type());
                false
            }
        });
        if let Some(found) = incompatible {
            return Err(ctx.operator_error(format!(
                "cannot compare {} values in '{}' with {} using '{}'",
                found,
                column,
                target.data_type(),
                op
            )));
        }

        let message = format!("Filtered by {} {} {}", column, op, configured);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Sort
// ============================================================================

/// Stable sort by one or more columns. Missing values always sort last.
#[derive(Debug, Clone)]
pub struct Sort;

impl Sort {
    fn directions(ctx: &ExecutionContext<'_>, count: usize) -> ExecutionResult<Vec<bool>> {
        match ctx.config().get("ascending") {
            None | Some(JsonValue::Null) => Ok(vec![true; count]),
            Some(JsonValue::Bool(asc)) => Ok(vec![*asc; count]),
            Some(JsonValue::Array(items)) => {
                let flags: Option<Vec<bool>> = items.iter().map(JsonValue::as_bool).collect();
                match flags {
                    Some(flags) if flags.len() == count => Ok(flags),
                    Some(flags) => Err(ctx.config_error(format!(
                        "'ascending' has {} entries for {} sort columns",
                        flags.len(),
                        count
                    ))),
                    None => Err(ctx.config_error("'ascending' must contain only true or false")),
                }
            }
            Some(_) => Err(ctx.config_error("'ascending' must be true, false or a list")),
        }
    }
}

impl Operator for Sort {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("SORT", "Sort Rows")
            .description("Order rows by one or more columns")
            .requires("columns")
            .tags(["rows", "order"])
            .build()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::primary(config.string_list("columns").unwrap_or_default())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let columns = ctx.get_string_list("columns")?;
        let ascending = Self::directions(ctx, columns.len())?;
        let keys = columns
            .iter()
            .map(|name| ctx.column_index(input, name))
            .collect::<ExecutionResult<Vec<_>>>()?;

        let mut rows = input.rows().to_vec();
        rows.sort_by(|a, b| {
            for (&idx, &asc) in keys.iter().zip(&ascending) {
                let ordering = match (a[idx].is_null(), b[idx].is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) if asc => a[idx].sort_cmp(&b[idx]),
                    (false, false) => b[idx].sort_cmp(&a[idx]),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let data = input.with_rows(rows).map_err(|e| ctx.dataset_error(e))?;
        Ok(NodeOutput::dataset(data, format!("Sorted by {}", join_names(&columns))))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Drop Duplicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keep {
    First,
    Last,
    None,
}

impl Keep {
    fn parse(value: Option<&JsonValue>) -> Result<Self, String> {
        match value {
            None | Some(JsonValue::Null) => Ok(Keep::First),
            Some(JsonValue::Bool(false)) => Ok(Keep::None),
            Some(JsonValue::String(s)) => match s.as_str() {
                "first" => Ok(Keep::First),
                "last" => Ok(Keep::Last),
                "none" => Ok(Keep::None),
                other => Err(format!(
                    "DROP_DUPLICATES 'keep' must be first, last or none, got '{}'",
                    other
                )),
            },
            Some(other) => Err(format!("DROP_DUPLICATES 'keep' must be a string, got {}", other)),
        }
    }
}

/// Remove repeated rows, comparing all columns or a subset.
#[derive(Debug, Clone)]
pub struct DropDuplicates;

impl Operator for DropDuplicates {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("DROP_DUPLICATES", "Drop Duplicates")
            .description("Remove repeated rows, optionally comparing only some columns")
            .tags(["rows", "cleaning"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        Keep::parse(config.get("keep")).err().into_iter().collect()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::primary(config.string_list("columns").unwrap_or_default())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let keep = Keep::parse(ctx.config().get("keep")).map_err(|m| ctx.config_error(m))?;
        let subset = match ctx.get_optional_string_list("columns")? {
            Some(columns) if !columns.is_empty() => columns
                .iter()
                .map(|name| ctx.column_index(input, name))
                .collect::<ExecutionResult<Vec<_>>>()?,
            _ => (0..input.column_count()).collect(),
        };

        let keys: Vec<Vec<ValueKey>> = input
            .rows()
            .iter()
            .map(|row| subset.iter().map(|&i| row[i].key()).collect())
            .collect();

        let kept: Vec<bool> = match keep {
            Keep::First => {
                let mut seen = IndexSet::new();
                keys.iter().map(|k| seen.insert(k)).collect()
            }
            Keep::Last => {
                let mut seen = IndexSet::new();
                let mut flags: Vec<bool> = keys.iter().rev().map(|k| seen.insert(k)).collect();
                flags.reverse();
                flags
            }
            Keep::None => {
                let mut counts: IndexMap<&Vec<ValueKey>, usize> = IndexMap::new();
                for key in &keys {
                    *counts.entry(key).or_default() += 1;
                }
                keys.iter().map(|k| counts.get(k) == Some(&1)).collect()
            }
        };

        let mut position = 0;
        let data = input.retain_rows(|_| {
            position += 1;
            kept[position - 1]
        });
        Ok(NodeOutput::dataset(data, "Dropped duplicates"))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::builtin::testing::{column, dataset, output, run, static_errors};
    use crate::core::dataset::Dataset;
    use serde_json::json;

    fn sales() -> Dataset {
        dataset(json!([
            {"region": "north", "amt": 10, "note": "ok"},
            {"region": "south", "amt": -5, "note": null},
            {"region": "north", "amt": 0, "note": "refund"},
            {"region": null, "amt": 7, "note": "late"}
        ]))
    }

    #[test]
    fn test_filter_greater_than() {
        let result = run(&Filter, json!({"column": "amt", "operator": ">", "value": 0}), &sales()).unwrap();
        assert_eq!(result.message(), "Filtered by amt > 0");
        let NodeOutput::Dataset { data, .. } = result else { panic!() };
        assert_eq!(column(&data, "amt"), vec![Value::Integer(10), Value::Integer(7)]);
    }

    #[test]
    fn test_filter_coerces_string_value() {
        let data = output(&Filter, json!({"column": "amt", "operator": "==", "value": "0"}), &sales());
        assert_eq!(data.row_count(), 1);
        assert_eq!(column(&data, "note"), vec![Value::from("refund")]);
    }

    #[test]
    fn test_filter_nulls() {
        let ne = output(&Filter, json!({"column": "region", "operator": "!=", "value": "north"}), &sales());
        assert_eq!(ne.row_count(), 2);
        let eq = output(&Filter, json!({"column": "region", "operator": "==", "value": "north"}), &sales());
        assert_eq!(eq.row_count(), 2);
        let contains = output(&Filter, json!({"column": "note", "operator": "contains", "value": "e"}), &sales());
        assert_eq!(column(&contains, "note"), vec![Value::from("refund"), Value::from("late")]);
    }

    #[test]
    fn test_filter_incompatible_ordering() {
        let error = run(&Filter, json!({"column": "region", "operator": ">", "value": 3}), &sales()).unwrap_err();
        assert_eq!(error.kind(), "OperatorError");
    }

    #[test]
    fn test_filter_static_operator_check() {
        let errors = static_errors(&Filter, json!({"column": "a", "operator": "~", "value": 1}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'~'"));
    }

    #[test]
    fn test_filter_value_presence_only() {
        let data = output(&Filter, json!({"column": "amt", "operator": ">=", "value": 0}), &sales());
        assert_eq!(data.row_count(), 3);
        assert!(Filter.metadata().requirements.contains(&crate::core::node::ConfigRequirement::Present("value".into())));
    }

    #[test]
    fn test_sort_nulls_last_both_directions() {
        let asc = output(&Sort, json!({"columns": "region"}), &sales());
        assert_eq!(column(&asc, "region")[3], Value::Null);
        assert_eq!(column(&asc, "amt"), vec![Value::Integer(10), Value::Integer(0), Value::Integer(-5), Value::Integer(7)]);

        let desc = output(&Sort, json!({"columns": ["region", "amt"], "ascending": [false, true]}), &sales());
        assert_eq!(column(&desc, "amt"), vec![Value::Integer(-5), Value::Integer(0), Value::Integer(10), Value::Integer(7)]);
    }

    #[test]
    fn test_sort_direction_length_mismatch() {
        let error = run(&Sort, json!({"columns": ["amt"], "ascending": [true, false]}), &sales()).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
    }

    #[test]
    fn test_drop_duplicates_modes() {
        let input = dataset(json!([
            {"k": 1, "v": "a"}, {"k": 2, "v": "b"}, {"k": 1, "v": "c"}, {"k": 3, "v": "d"}
        ]));

        let first = output(&DropDuplicates, json!({"columns": ["k"]}), &input);
        assert_eq!(column(&first, "v"), vec![Value::from("a"), Value::from("b"), Value::from("d")]);

        let last = output(&DropDuplicates, json!({"columns": ["k"], "keep": "last"}), &input);
        assert_eq!(column(&last, "v"), vec![Value::from("b"), Value::from("c"), Value::from("d")]);

        let none = output(&DropDuplicates, json!({"columns": ["k"], "keep": "none"}), &input);
        assert_eq!(column(&none, "v"), vec![Value::from("b"), Value::from("d")]);

        let all = output(&DropDuplicates, json!({}), &input);
        assert_eq!(all.row_count(), 4);
    }

    #[test]
    fn test_drop_duplicates_bad_keep() {
        assert_eq!(static_errors(&DropDuplicates, json!({"keep": "middle"})).len(), 1);
        assert!(static_errors(&DropDuplicates, json!({"keep": false})).is_empty());
    }
}
