//! Relational join of two datasets.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::dataset::Dataset;
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::types::{Value, ValueKey};
use crate::operators::builtin::join_names;
use crate::operators::registry::OperatorRegistry;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Config key the executor sets to the id of the node feeding the right side.
pub const RIGHT_NODE_KEY: &str = "right_node_id";

/// Register the join operator.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(Join));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinType {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "inner" => Some(JoinType::Inner),
            "left" => Some(JoinType::Left),
            "right" => Some(JoinType::Right),
            "outer" | "full" => Some(JoinType::Outer),
            _ => None,
        }
    }
}

/// Output column layout of a join.
struct Layout {
    names: Vec<String>,
    /// For each left column, the right column holding the same merged key
    left_fallback: Vec<Option<usize>>,
    /// Right columns emitted after the left ones
    right_columns: Vec<usize>,
}

impl Layout {
    fn new(left: &Dataset, right: &Dataset, keys: &[(usize, usize)], suffixes: (&str, &str)) -> Self {
        let left_names = left.column_names();
        let right_names = right.column_names();

        // a key pair with the same name on both sides collapses into one column
        let merged: Vec<(usize, usize)> = keys
            .iter()
            .copied()
            .filter(|&(l, r)| left_names[l] == right_names[r])
            .collect();

        let right_columns: Vec<usize> = (0..right_names.len())
            .filter(|r| !merged.iter().any(|&(_, m)| m == *r))
            .collect();

        let mut names = Vec::with_capacity(left_names.len() + right_columns.len());
        for (l, name) in left_names.iter().enumerate() {
            let clashes = right_columns.iter().any(|&r| &right_names[r] == name);
            let is_merged = merged.iter().any(|&(m, _)| m == l);
            if clashes && !is_merged {
                names.push(format!("{}{}", name, suffixes.0));
            } else {
                names.push(name.clone());
            }
        }
        for &r in &right_columns {
            let name = &right_names[r];
            if left_names.contains(name) {
                names.push(format!("{}{}", name, suffixes.1));
            } else {
                names.push(name.clone());
            }
        }

        let left_fallback = (0..left_names.len())
            .map(|l| merged.iter().find(|&&(m, _)| m == l).map(|&(_, r)| r))
            .collect();

        Self {
            names,
            left_fallback,
            right_columns,
        }
    }

    fn combine(&self, left: Option<&[Value]>, right: Option<&[Value]>) -> Vec<Value> {
        let mut row = Vec::with_capacity(self.names.len());
        for (l, fallback) in self.left_fallback.iter().enumerate() {
            let value = match (left, right, fallback) {
                (Some(left), _, _) => left[l].clone(),
                (None, Some(right), Some(r)) => right[*r].clone(),
                _ => Value::Null,
            };
            row.push(value);
        }
        for &r in &self.right_columns {
            row.push(right.map(|right| right[r].clone()).unwrap_or(Value::Null));
        }
        row
    }
}

/// Key of a row, `None` when any part is missing.
fn row_key(row: &[Value], indices: &[usize]) -> Option<Vec<ValueKey>> {
    indices
        .iter()
        .map(|&i| if row[i].is_null() { None } else { Some(row[i].key()) })
        .collect()
}

fn index_rows(data: &Dataset, indices: &[usize]) -> IndexMap<Vec<ValueKey>, Vec<usize>> {
    let mut index: IndexMap<Vec<ValueKey>, Vec<usize>> = IndexMap::new();
    for (position, row) in data.rows().iter().enumerate() {
        if let Some(key) = row_key(row, indices) {
            index.entry(key).or_default().push(position);
        }
    }
    index
}

fn suffixes(config: &NodeConfig) -> Result<(String, String), String> {
    match config.get("suffixes") {
        None | Some(JsonValue::Null) => Ok(("_left".to_string(), "_right".to_string())),
        Some(JsonValue::Array(items)) if items.len() == 2 => match (items[0].as_str(), items[1].as_str()) {
            (Some(l), Some(r)) => Ok((l.to_string(), r.to_string())),
            _ => Err("JOIN 'suffixes' must be two strings".to_string()),
        },
        Some(_) => Err("JOIN 'suffixes' must be two strings".to_string()),
    }
}

/// Join the primary (left) input with the secondary (right) input.
///
/// Null keys never match. Inner and left joins keep the left row order,
/// right joins the right order; outer joins emit the left join followed by
/// the unmatched right rows.
#[derive(Debug, Clone)]
pub struct Join;

impl Operator for Join {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("JOIN", "Join")
            .description("Combine two inputs on key columns (inner, left, right or outer)")
            .requires("join_type")
            .requires("left_on")
            .requires("right_on")
            .multi_input()
            .tags(["relational", "merge"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(join_type) = config.str("join_type") {
            if !join_type.is_empty() && JoinType::parse(join_type).is_none() {
                errors.push(format!(
                    "JOIN type '{}' is not supported (expected inner, left, right or outer)",
                    join_type
                ));
            }
        }
        if let (Some(left), Some(right)) = (config.string_list("left_on"), config.string_list("right_on")) {
            if left.len() != right.len() {
                errors.push(format!(
                    "JOIN 'left_on' has {} columns but 'right_on' has {}",
                    left.len(),
                    right.len()
                ));
            }
        }
        if let Err(message) = suffixes(config) {
            errors.push(message);
        }
        errors
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements {
            primary: config.string_list("left_on").unwrap_or_default(),
            secondary: config.string_list("right_on").unwrap_or_default(),
        }
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let left = ctx.input()?;
        let right = ctx
            .secondary_input()
            .ok_or_else(|| ctx.config_error("JOIN requires two inputs (left and right)"))?;

        let type_name = ctx.get_string("join_type")?;
        let join_type = JoinType::parse(type_name)
            .ok_or_else(|| ctx.config_error(format!("JOIN type '{}' is not supported", type_name)))?;
        let left_on = ctx.get_string_list("left_on")?;
        let right_on = ctx.get_string_list("right_on")?;
        if left_on.len() != right_on.len() {
            return Err(ctx.config_error("'left_on' and 'right_on' must name the same number of columns"));
        }
        let (left_suffix, right_suffix) = suffixes(ctx.config()).map_err(|m| ctx.config_error(m))?;

        let left_keys = left_on
            .iter()
            .map(|name| ctx.column_index(left, name))
            .collect::<ExecutionResult<Vec<_>>>()?;
        let right_keys = right_on
            .iter()
            .map(|name| ctx.column_index(right, name))
            .collect::<ExecutionResult<Vec<_>>>()?;
        let pairs: Vec<(usize, usize)> = left_keys.iter().copied().zip(right_keys.iter().copied()).collect();

        let layout = Layout::new(left, right, &pairs, (left_suffix.as_str(), right_suffix.as_str()));
        let mut rows = Vec::new();

        match join_type {
            JoinType::Right => {
                let left_index = index_rows(left, &left_keys);
                for right_row in right.rows() {
                    let matches = row_key(right_row, &right_keys).and_then(|k| left_index.get(&k));
                    match matches {
                        Some(positions) => {
                            for &l in positions {
                                rows.push(layout.combine(Some(left.rows()[l].as_slice()), Some(right_row.as_slice())));
                            }
                        }
                        None => rows.push(layout.combine(None, Some(right_row))),
                    }
                }
            }
            _ => {
                let right_index = index_rows(right, &right_keys);
                let mut matched = vec![false; right.row_count()];
                for left_row in left.rows() {
                    let matches = row_key(left_row, &left_keys).and_then(|k| right_index.get(&k));
                    match matches {
                        Some(positions) => {
                            for &r in positions {
                                matched[r] = true;
                                rows.push(layout.combine(Some(left_row.as_slice()), Some(right.rows()[r].as_slice())));
                            }
                        }
                        None if join_type != JoinType::Inner => {
                            rows.push(layout.combine(Some(left_row.as_slice()), None));
                        }
                        None => {}
                    }
                }
                if join_type == JoinType::Outer {
                    for (r, right_row) in right.rows().iter().enumerate() {
                        if !matched[r] {
                            rows.push(layout.combine(None, Some(right_row.as_slice())));
                        }
                    }
                }
            }
        }

        let data = Dataset::new(layout.names, rows).map_err(|e| ctx.dataset_error(e))?;
        let right_node = ctx.config().str(RIGHT_NODE_KEY).unwrap_or("right input");
        let message = format!(
            "Joined with {} on {}={} ({} join)",
            right_node,
            join_names(&left_on),
            join_names(&right_on),
            type_name
        );
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}
