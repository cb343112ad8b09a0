//! Date and time operators.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::types::{DataType, Value};
use crate::operators::registry::OperatorRegistry;
use chrono::{Datelike, NaiveDateTime, Timelike};

const DATE_PARTS: &[&str] = &["year", "month", "day", "dayofweek", "quarter", "hour"];
const DEFAULT_PARTS: &[&str] = &["year", "month", "day"];

/// Register date operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(ExtractDateParts));
}

fn part_of(dt: &NaiveDateTime, part: &str) -> Option<i64> {
    let value = match part {
        "year" => dt.year() as i64,
        "month" => dt.month() as i64,
        "day" => dt.day() as i64,
        "dayofweek" => dt.weekday().num_days_from_monday() as i64,
        "quarter" => ((dt.month() - 1) / 3 + 1) as i64,
        "hour" => dt.hour() as i64,
        _ => return None,
    };
    Some(value)
}

/// Extract calendar components into `{column}_{part}` columns.
///
/// The source column is converted to timestamps in place; text that does
/// not parse becomes null. `dayofweek` counts Monday as 0.
#[derive(Debug, Clone)]
pub struct ExtractDateParts;

impl Operator for ExtractDateParts {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("EXTRACT_DATE_PARTS", "Extract Date Parts")
            .description("Add year, month, day, weekday, quarter or hour columns from a date column")
            .requires("column")
            .tags(["datetime"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        config
            .string_list("parts")
            .unwrap_or_default()
            .iter()
            .filter(|p| !DATE_PARTS.contains(&p.as_str()))
            .map(|p| {
                format!(
                    "EXTRACT_DATE_PARTS part '{}' is not supported (expected one of {})",
                    p,
                    DATE_PARTS.join(", ")
                )
            })
            .collect()
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::primary(config.str("column").map(|c| vec![c.to_string()]).unwrap_or_default())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let parts = ctx
            .get_optional_string_list("parts")?
            .unwrap_or_else(|| DEFAULT_PARTS.iter().map(|p| p.to_string()).collect());
        if let Some(bad) = parts.iter().find(|p| !DATE_PARTS.contains(&p.as_str())) {
            return Err(ctx.config_error(format!("EXTRACT_DATE_PARTS part '{}' is not supported", bad)));
        }
        let idx = ctx.column_index(input, column)?;

        let timestamps: Vec<Value> = input
            .column_values(idx)
            .map(|v| v.cast(DataType::DateTime, None))
            .collect();
        let mut data = input
            .with_column(column, timestamps.clone())
            .map_err(|e| ctx.dataset_error(e))?;

        // parts are added in canonical order regardless of how they were listed
        for part in DATE_PARTS.iter().filter(|p| parts.iter().any(|q| q == *p)) {
            let values = timestamps
                .iter()
                .map(|v| {
                    v.as_datetime()
                        .and_then(|dt| part_of(&dt, part))
                        .map(Value::Integer)
                        .unwrap_or(Value::Null)
                })
                .collect();
            data = data
                .with_column(&format!("{}_{}", column, part), values)
                .map_err(|e| ctx.dataset_error(e))?;
        }

        let message = format!("Extracted {} date parts from {}", parts.len(), column);
        Ok(NodeOutput::dataset(data, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}
