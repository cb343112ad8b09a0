//! Cleaning and statistical operators over a single column.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::dataset::Dataset;
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::stats;
use crate::core::types::Value;
use crate::operators::registry::OperatorRegistry;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Register cleaning and statistical operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(FillMissing));
    registry.register(|| Box::new(Normalize));
    registry.register(|| Box::new(FilterOutliers));
    registry.register(|| Box::new(Binning));
}

fn single_column(config: &NodeConfig) -> ColumnRequirements {
    ColumnRequirements::primary(config.str("column").map(|c| vec![c.to_string()]).unwrap_or_default())
}

/// Check an optional `key` against the accepted names.
fn check_choice(kind: &str, config: &NodeConfig, key: &str, accepted: &[&str]) -> Vec<String> {
    match config.str(key) {
        Some(value) if !accepted.contains(&value) => vec![format!(
            "{} {} '{}' is not supported (expected one of {})",
            kind,
            key,
            value,
            accepted.join(", ")
        )],
        _ => Vec::new(),
    }
}

/// Numeric values of a column, failing on any non-null, non-numeric cell.
fn numeric_column(ctx: &ExecutionContext<'_>, data: &Dataset, idx: usize) -> ExecutionResult<Vec<Option<f64>>> {
    data.column_values(idx)
        .map(|v| match v {
            v if v.is_null() => Ok(None),
            v => v.as_float().map(Some).ok_or_else(|| {
                ctx.operator_error(format!(
                    "column '{}' must be numeric, found {} value '{}'",
                    data.columns()[idx].name,
                    v.data_type(),
                    v
                ))
            }),
        })
        .collect()
}

// ============================================================================
// Fill Missing
// ============================================================================

const FILL_STRATEGIES: &[&str] = &["constant", "mean", "median", "mode", "forward", "ffill", "backward", "bfill"];

/// Replace missing values in a column.
#[derive(Debug, Clone)]
pub struct FillMissing;

impl FillMissing {
    fn carry(values: &[Value], reverse: bool) -> Vec<Value> {
        let mut last = Value::Null;
        let mut filled: Vec<Value> = Vec::with_capacity(values.len());
        let order: Box<dyn Iterator<Item = &Value>> = if reverse {
            Box::new(values.iter().rev())
        } else {
            Box::new(values.iter())
        };
        for value in order {
            if value.is_null() {
                filled.push(last.clone());
            } else {
                last = value.clone();
                filled.push(value.clone());
            }
        }
        if reverse {
            filled.reverse();
        }
        filled
    }

    fn mode(values: &[Value]) -> Option<Value> {
        let mut counts: IndexMap<_, (usize, &Value)> = IndexMap::new();
        for value in values.iter().filter(|v| !v.is_null()) {
            counts.entry(value.key()).or_insert((0, value)).0 += 1;
        }
        let best = counts.values().map(|(n, _)| *n).max()?;
        counts
            .values()
            .find(|(n, _)| *n == best)
            .map(|(_, v)| (*v).clone())
    }
}

impl Operator for FillMissing {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("FILL_MISSING", "Fill Missing Values")
            .description("Fill nulls with a constant, a statistic or the neighbouring value")
            .requires("column")
            .tags(["cleaning", "nulls"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        check_choice("FILL_MISSING", config, "strategy", FILL_STRATEGIES)
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        single_column(config)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let strategy = ctx.get_string_or("strategy", "constant")?;
        let idx = ctx.column_index(input, column)?;
        let values: Vec<Value> = input.column_values(idx).cloned().collect();

        let fill_with = |replacement: Option<Value>| match replacement {
            Some(r) => values.iter().map(|v| if v.is_null() { r.clone() } else { v.clone() }).collect(),
            None => values.clone(),
        };

        let filled: Vec<Value> = match strategy {
            "constant" => {
                let constant = ctx
                    .config()
                    .get("value")
                    .map(Value::from_json)
                    .unwrap_or(Value::Integer(0));
                fill_with(Some(constant))
            }
            "mean" | "median" => {
                let numbers: Vec<f64> = numeric_column(ctx, input, idx)?.into_iter().flatten().collect();
                let statistic = if strategy == "mean" {
                    stats::mean(&numbers)
                } else {
                    stats::median(&numbers)
                };
                fill_with(statistic.map(Value::Float))
            }
            "mode" => fill_with(Self::mode(&values)),
            "forward" | "ffill" => Self::carry(&values, false),
            "backward" | "bfill" => Self::carry(&values, true),
            other => {
                return Err(ctx.config_error(format!("FILL_MISSING strategy '{}' is not supported", other)))
            }
        };

        let data = input.with_column(column, filled).map_err(|e| ctx.dataset_error(e))?;
        let message = format!("Filled missing in {} with {}", column, strategy);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Normalize
// ============================================================================

const NORMALIZE_METHODS: &[&str] = &["min_max", "z_score", "robust"];

/// Rescale a numeric column. A zero spread leaves the column unchanged.
#[derive(Debug, Clone)]
pub struct Normalize;

impl Operator for Normalize {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("NORMALIZE", "Normalize")
            .description("Scale a numeric column with min-max, z-score or robust scaling")
            .requires("column")
            .tags(["numeric", "scaling"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        check_choice("NORMALIZE", config, "method", NORMALIZE_METHODS)
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        single_column(config)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let method = ctx.get_string_or("method", "min_max")?;
        let idx = ctx.column_index(input, column)?;
        let cells = numeric_column(ctx, input, idx)?;
        let numbers: Vec<f64> = cells.iter().flatten().copied().collect();

        // (center, scale), None when the spread is zero or undefined
        let transform = match method {
            "min_max" => stats::min_max(&numbers).map(|(lo, hi)| (lo, hi - lo)),
            "z_score" => stats::mean(&numbers).zip(stats::std_dev(&numbers)),
            "robust" => stats::median(&numbers).zip(
                stats::quantile(&numbers, 0.75)
                    .zip(stats::quantile(&numbers, 0.25))
                    .map(|(q3, q1)| q3 - q1),
            ),
            other => {
                return Err(ctx.config_error(format!("NORMALIZE method '{}' is not supported", other)))
            }
        }
        .filter(|&(_, scale)| scale != 0.0);

        let data = match transform {
            Some((center, scale)) => {
                let values = cells
                    .iter()
                    .map(|c| c.map(|v| Value::Float((v - center) / scale)).unwrap_or(Value::Null))
                    .collect();
                input.with_column(column, values).map_err(|e| ctx.dataset_error(e))?
            }
            None => input.clone(),
        };

        let message = format!("Normalized {} using {}", column, method);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Filter Outliers
// ============================================================================

const OUTLIER_METHODS: &[&str] = &["std", "iqr", "percentile"];

/// Drop rows whose value lies outside statistical bounds.
///
/// Bounds are inclusive. Rows with a missing value are dropped too.
#[derive(Debug, Clone)]
pub struct FilterOutliers;

impl Operator for FilterOutliers {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("FILTER_OUTLIERS", "Filter Outliers")
            .description("Drop rows outside standard-deviation, IQR or percentile bounds")
            .requires("column")
            .tags(["numeric", "cleaning"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        let mut errors = check_choice("FILTER_OUTLIERS", config, "method", OUTLIER_METHODS);
        if config.contains("threshold") && config.f64("threshold").is_none() {
            errors.push("FILTER_OUTLIERS 'threshold' must be a number".to_string());
        }
        errors
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        single_column(config)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let method = ctx.get_string_or("method", "std")?;
        let threshold = ctx.get_float_or("threshold", 3.0)?;
        let idx = ctx.column_index(input, column)?;
        let cells = numeric_column(ctx, input, idx)?;
        let numbers: Vec<f64> = cells.iter().flatten().copied().collect();

        let bounds = match method {
            "std" => match (stats::mean(&numbers), stats::std_dev(&numbers)) {
                (Some(mean), Some(std)) => Some((mean - threshold * std, mean + threshold * std)),
                // fewer than two values have no sample deviation, so nothing is kept
                _ => None,
            },
            "iqr" => stats::quantile(&numbers, 0.25)
                .zip(stats::quantile(&numbers, 0.75))
                .map(|(q1, q3)| (q1 - threshold * (q3 - q1), q3 + threshold * (q3 - q1))),
            "percentile" => {
                if !(0.0..50.0).contains(&threshold) {
                    return Err(ctx.config_error(format!(
                        "percentile threshold must be between 0 and 50, got {}",
                        threshold
                    )));
                }
                stats::quantile(&numbers, threshold / 100.0)
                    .zip(stats::quantile(&numbers, 1.0 - threshold / 100.0))
            }
            other => {
                return Err(ctx.config_error(format!(
                    "FILTER_OUTLIERS method '{}' is not supported",
                    other
                )))
            }
        };

        let mut position = 0;
        let data = input.retain_rows(|_| {
            let cell = cells[position];
            position += 1;
            match (cell, bounds) {
                (Some(v), Some((lo, hi))) => v >= lo && v <= hi,
                _ => false,
            }
        });

        let message = format!("Filtered outliers in {} using {}", column, method);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Binning
// ============================================================================

/// Largest accepted equal-width bin count.
const MAX_BINS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum Bins {
    Count(usize),
    Edges(Vec<f64>),
}

impl Bins {
    fn parse(value: Option<&JsonValue>) -> Result<Self, String> {
        match value {
            None | Some(JsonValue::Null) => Ok(Bins::Count(5)),
            Some(JsonValue::Number(n)) => match n.as_u64() {
                Some(count) if count > MAX_BINS => Err(format!(
                    "BINNING 'bins' must be at most {}, got {}",
                    MAX_BINS, count
                )),
                Some(count) if count > 0 => Ok(Bins::Count(count as usize)),
                _ => Err("BINNING 'bins' must be a positive integer or a list of edges".to_string()),
            },
            Some(JsonValue::Array(items)) => {
                let edges: Option<Vec<f64>> = items.iter().map(JsonValue::as_f64).collect();
                match edges {
                    Some(edges) if edges.len() >= 2 && edges.windows(2).all(|w| w[0] < w[1]) => {
                        Ok(Bins::Edges(edges))
                    }
                    _ => Err("BINNING edges must be at least two increasing numbers".to_string()),
                }
            }
            Some(_) => Err("BINNING 'bins' must be a positive integer or a list of edges".to_string()),
        }
    }

    fn count(&self) -> usize {
        match self {
            Bins::Count(n) => *n,
            Bins::Edges(edges) => edges.len() - 1,
        }
    }

    /// Concrete edges; equal-width edges span the data with the lowest widened.
    fn edges(&self, numbers: &[f64]) -> Option<Vec<f64>> {
        match self {
            Bins::Edges(edges) => Some(edges.clone()),
            Bins::Count(n) => {
                let (min, max) = stats::min_max(numbers)?;
                let (lo, hi) = if min == max {
                    let pad = if min == 0.0 { 0.001 } else { 0.001 * min.abs() };
                    (min - pad, max + pad)
                } else {
                    (min, max)
                };
                let width = (hi - lo) / *n as f64;
                let mut edges: Vec<f64> = (0..=*n).map(|i| lo + width * i as f64).collect();
                edges[*n] = hi;
                if min != max {
                    edges[0] -= (max - min) * 0.001;
                }
                Some(edges)
            }
        }
    }
}

/// Interval text in the style `(0.5, 1.0]`.
fn interval_label(lo: f64, hi: f64) -> String {
    fn edge(x: f64) -> String {
        let rounded = (x * 1000.0).round() / 1000.0;
        if rounded.fract() == 0.0 {
            format!("{:.1}", rounded)
        } else {
            rounded.to_string()
        }
    }
    format!("({}, {}]", edge(lo), edge(hi))
}

/// Assign values to right-closed intervals.
#[derive(Debug, Clone)]
pub struct Binning;

impl Binning {
    fn labels(ctx: &ExecutionContext<'_>, count: usize) -> ExecutionResult<Option<Vec<String>>> {
        let Some(labels) = ctx.get_optional_string_list("labels")? else {
            return Ok(None);
        };
        if labels.len() != count {
            return Err(ctx.config_error(format!(
                "BINNING has {} labels for {} bins",
                labels.len(),
                count
            )));
        }
        Ok(Some(labels))
    }
}

impl Operator for Binning {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("BINNING", "Binning")
            .description("Bucket a numeric column into intervals")
            .requires("column")
            .requires("bins")
            .tags(["numeric", "categorize"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        if !config.is_set("bins") {
            return Vec::new();
        }
        let mut errors = Vec::new();
        match Bins::parse(config.get("bins")) {
            Ok(bins) => {
                if let Some(labels) = config.string_list("labels") {
                    if labels.len() != bins.count() {
                        errors.push(format!(
                            "BINNING has {} labels for {} bins",
                            labels.len(),
                            bins.count()
                        ));
                    }
                }
            }
            Err(message) => errors.push(message),
        }
        errors
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        single_column(config)
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let bins = Bins::parse(ctx.config().get("bins")).map_err(|m| ctx.config_error(m))?;
        let labels = Self::labels(ctx, bins.count())?;
        let new_column = match ctx.config().str("new_column") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}_binned", column),
        };
        let idx = ctx.column_index(input, column)?;
        let cells = numeric_column(ctx, input, idx)?;
        let numbers: Vec<f64> = cells.iter().flatten().copied().collect();

        let values = match bins.edges(&numbers) {
            Some(edges) => cells
                .iter()
                .map(|cell| {
                    let bin = cell.and_then(|v| edges.windows(2).position(|w| w[0] < v && v <= w[1]));
                    match (bin, &labels) {
                        (Some(b), Some(labels)) => Value::String(labels[b].clone()),
                        (Some(b), None) => Value::String(interval_label(edges[b], edges[b + 1])),
                        (None, _) => Value::Null,
                    }
                })
                .collect(),
            None => vec![Value::Null; input.row_count()],
        };

        let data = input.with_column(&new_column, values).map_err(|e| ctx.dataset_error(e))?;
        let message = format!("Binned {} into {} categories", column, bins.count());
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

    fn values() -> Dataset {
        dataset(json!([{"v": 1.0}, {"v": null}, {"v": 3.0}, {"v": 5.0}]))
    }

    #[test]
    fn test_fill_constant_defaults_to_zero() {
        let data = output(&FillMissing, json!({"column": "v"}), &values());
        assert_eq!(column(&data, "v")[1], Value::Integer(0));
        let data = output(&FillMissing, json!({"column": "v", "value": 9.5}), &values());
        assert_eq!(column(&data, "v")[1], Value::Float(9.5));
    }

    #[test]
    fn test_fill_statistics() {
        let mean = output(&FillMissing, json!({"column": "v", "strategy": "mean"}), &values());
        assert_eq!(column(&mean, "v")[1], Value::Float(3.0));
        let median = output(&FillMissing, json!({"column": "v", "strategy": "median"}), &values());
        assert_eq!(column(&median, "v")[1], Value::Float(3.0));
    }

    #[test]
    fn test_fill_forward_and_backward() {
        let input = dataset(json!([{"v": null}, {"v": "a"}, {"v": null}, {"v": "b"}, {"v": null}]));
        let forward = output(&FillMissing, json!({"column": "v", "strategy": "ffill"}), &input);
        assert_eq!(
            column(&forward, "v"),
            vec![Value::Null, Value::from("a"), Value::from("a"), Value::from("b"), Value::from("b")]
        );
        let backward = output(&FillMissing, json!({"column": "v", "strategy": "backward"}), &input);
        assert_eq!(
            column(&backward, "v"),
            vec![Value::from("a"), Value::from("a"), Value::from("b"), Value::from("b"), Value::Null]
        );
    }

    #[test]
    fn test_fill_mean_rejects_text() {
        let input = dataset(json!([{"v": "x"}, {"v": null}]));
        let error = run(&FillMissing, json!({"column": "v", "strategy": "mean"}), &input).unwrap_err();
        assert_eq!(error.kind(), "OperatorError");
    }

    #[test]
    fn test_normalize_min_max() {
        let data = output(&Normalize, json!({"column": "v"}), &values());
        assert_eq!(
            column(&data, "v"),
            vec![Value::Float(0.0), Value::Null, Value::Float(0.5), Value::Float(1.0)]
        );
    }

    #[test]
    fn test_normalize_z_score_and_constant_column() {
        let data = output(&Normalize, json!({"column": "v", "method": "z_score"}), &values());
        assert_eq!(column(&data, "v")[0], Value::Float(-1.0));

        let constant = dataset(json!([{"v": 2}, {"v": 2}]));
        let data = output(&Normalize, json!({"column": "v"}), &constant);
        assert_eq!(column(&data, "v"), vec![Value::Integer(2), Value::Integer(2)]);
    }

    #[test]
    fn test_filter_outliers_std() {
        let mut records: Vec<JsonValue> = (0..20).map(|_| json!({"v": 10})).collect();
        records.push(json!({"v": 1000}));
        records.push(json!({"v": null}));
        let input = dataset(JsonValue::Array(records));
        let data = output(&FilterOutliers, json!({"column": "v", "threshold": 2}), &input);
        assert_eq!(data.row_count(), 20);
    }

    #[test]
    fn test_filter_outliers_std_needs_two_values() {
        let single = dataset(json!([{"x": 5}, {"x": null}]));
        let data = output(&FilterOutliers, json!({"column": "x"}), &single);
        assert_eq!(data.row_count(), 0);

        let constant = dataset(json!([{"x": 5}, {"x": 5}]));
        let data = output(&FilterOutliers, json!({"column": "x"}), &constant);
        assert_eq!(data.row_count(), 2);
    }

    #[test]
    fn test_filter_outliers_percentile_bounds() {
        let records: Vec<JsonValue> = (1..=11).map(|i| json!({"v": i})).collect();
        let input = dataset(JsonValue::Array(records));
        let data = output(&FilterOutliers, json!({"column": "v", "method": "percentile", "threshold": 10}), &input);
        assert_eq!(column(&data, "v").first(), Some(&Value::Integer(2)));
        assert_eq!(column(&data, "v").last(), Some(&Value::Integer(10)));

        let error = run(&FilterOutliers, json!({"column": "v", "method": "percentile", "threshold": 60}), &input).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
    }

    #[test]
    fn test_binning_equal_width() {
        let input = dataset(json!([{"v": 0}, {"v": 5}, {"v": 10}]));
        let data = output(&Binning, json!({"column": "v", "bins": 2}), &input);
        assert_eq!(
            column(&data, "v_binned"),
            vec![Value::from("(-0.01, 5.0]"), Value::from("(-0.01, 5.0]"), Value::from("(5.0, 10.0]")]
        );
    }

    #[test]
    fn test_binning_edges_and_labels() {
        let input = dataset(json!([{"v": 1}, {"v": 15}, {"v": 99}]));
        let data = output(
            &Binning,
            json!({"column": "v", "bins": [0, 10, 20], "labels": ["low", "high"], "new_column": "bucket"}),
            &input,
        );
        assert_eq!(column(&data, "bucket"), vec![Value::from("low"), Value::from("high"), Value::Null]);
    }

    #[test]
    fn test_binning_rejects_huge_counts() {
        let errors = static_errors(&Binning, json!({"column": "v", "bins": u64::MAX}));
        assert_eq!(errors, vec![format!("BINNING 'bins' must be at most 10000, got {}", u64::MAX)]);

        let input = dataset(json!([{"v": 1}, {"v": 2}]));
        let error = run(&Binning, json!({"column": "v", "bins": u64::MAX}), &input).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");

        let data = output(&Binning, json!({"column": "v", "bins": 10_000}), &input);
        assert_eq!(data.row_count(), 2);
    }

    #[test]
    fn test_static_checks() {
        assert_eq!(static_errors(&Normalize, json!({"column": "v", "method": "log"})).len(), 1);
        assert_eq!(static_errors(&FillMissing, json!({"column": "v", "strategy": "guess"})).len(), 1);
        assert_eq!(static_errors(&Binning, json!({"column": "v", "bins": [3, 1]})).len(), 1);
        assert_eq!(static_errors(&Binning, json!({"column": "v", "bins": 3, "labels": ["a"]})).len(), 1);
        assert!(static_errors(&FilterOutliers, json!({"column": "v", "method": "iqr"})).is_empty());
    }
}
