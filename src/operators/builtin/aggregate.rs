//! Group-by aggregation.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::dataset::Dataset;
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::stats;
use crate::core::types::{Value, ValueKey};
use crate::operators::builtin::join_names;
use crate::operators::registry::OperatorRegistry;
use indexmap::IndexSet;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Register the aggregate operator.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(Aggregate));
}

/// Aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggFunc {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Nunique,
    Std,
    Var,
    First,
    Last,
}

impl AggFunc {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "sum" => Some(AggFunc::Sum),
            "mean" | "avg" | "average" => Some(AggFunc::Mean),
            "median" => Some(AggFunc::Median),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "count" => Some(AggFunc::Count),
            "nunique" => Some(AggFunc::Nunique),
            "std" => Some(AggFunc::Std),
            "var" => Some(AggFunc::Var),
            "first" => Some(AggFunc::First),
            "last" => Some(AggFunc::Last),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Nunique => "nunique",
            AggFunc::Std => "std",
            AggFunc::Var => "var",
            AggFunc::First => "first",
            AggFunc::Last => "last",
        }
    }

    fn needs_numbers(&self) -> bool {
        matches!(
            self,
            AggFunc::Sum | AggFunc::Mean | AggFunc::Median | AggFunc::Std | AggFunc::Var
        )
    }

    /// Apply to the non-null values of one group.
    fn apply(&self, values: &[&Value]) -> Value {
        let numbers = || values.iter().filter_map(|v| v.as_float()).collect::<Vec<_>>();
        let float = |v: Option<f64>| v.map(Value::Float).unwrap_or(Value::Null);
        match self {
            AggFunc::Sum => {
                if values.iter().all(|v| matches!(v, Value::Integer(_))) {
                    values
                        .iter()
                        .filter_map(|v| v.as_integer())
                        .try_fold(0i64, i64::checked_add)
                        .map(Value::Integer)
                        .unwrap_or_else(|| Value::Float(numbers().iter().sum()))
                } else {
                    Value::Float(numbers().iter().sum())
                }
            }
            AggFunc::Mean => float(stats::mean(&numbers())),
            AggFunc::Median => float(stats::median(&numbers())),
            AggFunc::Std => float(stats::std_dev(&numbers())),
            AggFunc::Var => float(stats::variance(&numbers())),
            AggFunc::Min => values
                .iter()
                .min_by(|a, b| a.sort_cmp(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggFunc::Max => values
                .iter()
                .max_by(|a, b| a.sort_cmp(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggFunc::Count => Value::Integer(values.len() as i64),
            AggFunc::Nunique => {
                let distinct: IndexSet<ValueKey> = values.iter().map(|v| v.key()).collect();
                Value::Integer(distinct.len() as i64)
            }
            AggFunc::First => values.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
            AggFunc::Last => values.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AggSpec {
    column: String,
    func: AggFunc,
    output: String,
}

fn spec(column: &str, func: &str, output: Option<&str>) -> Result<AggSpec, String> {
    let func = AggFunc::parse(func)
        .ok_or_else(|| format!("AGGREGATE function '{}' is not supported", func))?;
    Ok(AggSpec {
        column: column.to_string(),
        func,
        output: output
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", column, func.name())),
    })
}

/// Parse `aggregations` in list form (`[{column, agg, as}]`) or map form
/// (`{column: agg}` / `{column: [aggs]}`).
fn aggregation_specs(config: &NodeConfig) -> Result<Vec<AggSpec>, String> {
    let specs = match config.get("aggregations") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let entry = item
                    .as_object()
                    .ok_or_else(|| format!("AGGREGATE entry {} must be an object", i))?;
                let column = entry
                    .get("column")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| format!("AGGREGATE entry {} requires 'column'", i))?;
                let func = entry
                    .get("agg")
                    .or_else(|| entry.get("func"))
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| format!("AGGREGATE entry {} requires 'agg'", i))?;
                let output = entry
                    .get("as")
                    .or_else(|| entry.get("output_column"))
                    .and_then(JsonValue::as_str);
                spec(column, func, output)
            })
            .collect::<Result<Vec<_>, String>>()?,
        Some(JsonValue::Object(map)) => {
            let mut specs = Vec::new();
            for (column, funcs) in map {
                match funcs {
                    JsonValue::String(func) => specs.push(spec(column, func, Some(column))?),
                    JsonValue::Array(list) => {
                        for func in list {
                            let func = func.as_str().ok_or_else(|| {
                                format!("AGGREGATE functions for '{}' must be strings", column)
                            })?;
                            specs.push(spec(column, func, None)?);
                        }
                    }
                    _ => {
                        return Err(format!(
                            "AGGREGATE functions for '{}' must be a string or a list",
                            column
                        ))
                    }
                }
            }
            specs
        }
        Some(JsonValue::Null) | None => return Err("AGGREGATE requires 'aggregations'".to_string()),
        Some(_) => return Err("AGGREGATE 'aggregations' must be a list or an object".to_string()),
    };
    if specs.is_empty() {
        return Err("AGGREGATE requires at least one aggregation".to_string());
    }
    Ok(specs)
}

/// Group rows by key columns and aggregate the others.
///
/// Groups come out in ascending key order. Rows whose group key has a
/// missing value are dropped.
#[derive(Debug, Clone)]
pub struct Aggregate;

impl Operator for Aggregate {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("AGGREGATE", "Aggregate")
            .description("Group rows and compute sum, mean, count and other aggregates")
            .requires("group_by")
            .requires("aggregations")
            .tags(["group", "summary"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        if !config.is_set("aggregations") {
            return Vec::new();
        }
        aggregation_specs(config).err().into_iter().collect()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        let mut columns = config.string_list("group_by").unwrap_or_default();
        if let Ok(specs) = aggregation_specs(config) {
            columns.extend(specs.into_iter().map(|s| s.column));
        }
        ColumnRequirements::primary(columns)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let group_by = ctx.get_string_list("group_by")?;
        let specs = aggregation_specs(ctx.config()).map_err(|m| ctx.config_error(m))?;

        let key_indices = group_by
            .iter()
            .map(|name| ctx.column_index(input, name))
            .collect::<ExecutionResult<Vec<_>>>()?;
        let value_indices = specs
            .iter()
            .map(|s| ctx.column_index(input, &s.column))
            .collect::<ExecutionResult<Vec<_>>>()?;

        for (spec, &idx) in specs.iter().zip(&value_indices) {
            if spec.func.needs_numbers() {
                if let Some(bad) = input.column_values(idx).find(|v| !v.is_null() && !v.is_numeric()) {
                    return Err(ctx.operator_error(format!(
                        "cannot compute {} of '{}': found {} value '{}'",
                        spec.func.name(),
                        spec.column,
                        bad.data_type(),
                        bad
                    )));
                }
            }
        }

        let mut groups: BTreeMap<Vec<ValueKey>, Vec<usize>> = BTreeMap::new();
        for (row_idx, row) in input.rows().iter().enumerate() {
            if key_indices.iter().any(|&i| row[i].is_null()) {
                continue;
            }
            let key = key_indices.iter().map(|&i| row[i].key()).collect();
            groups.entry(key).or_default().push(row_idx);
        }

        let rows = groups
            .values()
            .map(|members| {
                let first = &input.rows()[members[0]];
                let mut row: Vec<Value> = key_indices.iter().map(|&i| first[i].clone()).collect();
                for (spec, &idx) in specs.iter().zip(&value_indices) {
                    let values: Vec<&Value> = members
                        .iter()
                        .map(|&r| &input.rows()[r][idx])
                        .filter(|v| !v.is_null())
                        .collect();
                    row.push(spec.func.apply(&values));
                }
                row
            })
            .collect();

        let mut names = group_by.clone();
        names.extend(specs.iter().map(|s| s.output.clone()));
        let data = Dataset::new(names, rows).map_err(|e| ctx.dataset_error(e))?;

        let message = format!("Aggregated by {}", join_names(&group_by));
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::builtin::testing::{column, dataset, output, run, static_errors};
    use serde_json::json;

    fn input() -> Dataset {
        dataset(json!([
            {"g": "b", "x": 5, "y": 1.5},
            {"g": "a", "x": 1, "y": null},
            {"g": "a", "x": 2, "y": 4.0},
            {"g": null, "x": 100, "y": 0.0}
        ]))
    }

    #[test]
    fn test_sum_per_group() {
        let data = output(
            &Aggregate,
            json!({"group_by": ["g"], "aggregations": [{"column": "x", "agg": "sum", "as": "x_sum"}]}),
            &input(),
        );
        assert_eq!(data.column_names(), vec!["g", "x_sum"]);
        assert_eq!(column(&data, "g"), vec![Value::from("a"), Value::from("b")]);
        assert_eq!(column(&data, "x_sum"), vec![Value::Integer(3), Value::Integer(5)]);
    }

    #[test]
    fn test_map_form_and_default_names() {
        let data = output(
            &Aggregate,
            json!({"group_by": "g", "aggregations": {"x": ["mean", "count"], "y": "max"}}),
            &input(),
        );
        assert_eq!(data.column_names(), vec!["g", "x_mean", "x_count", "y"]);
        assert_eq!(column(&data, "x_mean"), vec![Value::Float(1.5), Value::Float(5.0)]);
        assert_eq!(column(&data, "x_count"), vec![Value::Integer(2), Value::Integer(1)]);
        assert_eq!(column(&data, "y"), vec![Value::Float(4.0), Value::Float(1.5)]);
    }

    #[test]
    fn test_nulls_skipped_within_groups() {
        let data = output(
            &Aggregate,
            json!({"group_by": ["g"], "aggregations": [
                {"column": "y", "agg": "count", "as": "n"},
                {"column": "y", "agg": "first", "as": "first_y"},
                {"column": "x", "agg": "nunique", "as": "distinct"}
            ]}),
            &input(),
        );
        assert_eq!(column(&data, "n"), vec![Value::Integer(1), Value::Integer(1)]);
        assert_eq!(column(&data, "first_y"), vec![Value::Float(4.0), Value::Float(1.5)]);
        assert_eq!(column(&data, "distinct"), vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn test_numeric_function_on_text_column() {
        let error = run(
            &Aggregate,
            json!({"group_by": ["x"], "aggregations": [{"column": "g", "agg": "sum"}]}),
            &input(),
        )
        .unwrap_err();
        assert_eq!(error.kind(), "OperatorError");
    }

    #[test]
    fn test_static_checks() {
        let errors = static_errors(
            &Aggregate,
            json!({"group_by": ["g"], "aggregations": [{"column": "x", "agg": "product"}]}),
        );
        assert_eq!(errors, vec!["AGGREGATE function 'product' is not supported"]);
        let errors = static_errors(&Aggregate, json!({"group_by": ["g"], "aggregations": [{"agg": "sum"}]}));
        assert_eq!(errors, vec!["AGGREGATE entry 0 requires 'column'"]);
    }

    #[test]
    fn test_required_columns() {
        let config = NodeConfig::from_json(json!({
            "group_by": ["g"],
            "aggregations": [{"column": "x", "agg": "sum"}]
        }));
        assert_eq!(Aggregate.required_columns(&config).primary, vec!["g", "x"]);
    }
}
