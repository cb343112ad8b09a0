//! Text cleanup on a single column.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::error::ExecutionResult;
use crate::core::node::{ColumnRequirements, NodeOutput, Operator, OperatorMetadata};
use crate::core::types::Value;
use crate::operators::registry::OperatorRegistry;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Currency symbols, thousands separators and whitespace.
static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$€£¥₹,\s]").expect("valid currency regex"));

/// Register text operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(StringTransform));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextOp {
    Trim,
    Lowercase,
    Uppercase,
    Title,
    RemoveSpaces,
    CleanPhone,
    ParseCurrency,
    ValidateEmail,
}

impl TextOp {
    const ALL: &'static [&'static str] = &[
        "trim",
        "lowercase",
        "uppercase",
        "title",
        "remove_spaces",
        "clean_phone",
        "parse_currency",
        "validate_email",
    ];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "trim" => Some(TextOp::Trim),
            "lowercase" => Some(TextOp::Lowercase),
            "uppercase" => Some(TextOp::Uppercase),
            "title" => Some(TextOp::Title),
            "remove_spaces" => Some(TextOp::RemoveSpaces),
            "clean_phone" => Some(TextOp::CleanPhone),
            "parse_currency" => Some(TextOp::ParseCurrency),
            "validate_email" => Some(TextOp::ValidateEmail),
            _ => None,
        }
    }
}

/// Capitalize the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

/// Apply a cleanup operation to a text column.
///
/// Missing values stay missing. `validate_email` replaces values that do
/// not look like an address with null; `parse_currency` produces floats and
/// fails on text that is not an amount.
#[derive(Debug, Clone)]
pub struct StringTransform;

impl Operator for StringTransform {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("STRING_TRANSFORM", "String Transform")
            .description("Trim, change case, strip spaces, clean phones, parse currency or validate emails")
            .requires("column")
            .requires("operation")
            .tags(["text", "cleaning"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.str("operation") {
            Some(op) if !op.is_empty() && TextOp::parse(op).is_none() => vec![format!(
                "STRING_TRANSFORM operation '{}' is not supported (expected one of {})",
                op,
                TextOp::ALL.join(", ")
            )],
            _ => Vec::new(),
        }
    }

    fn required_columns(&self, config: &NodeConfig) -> ColumnRequirements {
        ColumnRequirements::primary(config.str("column").map(|c| vec![c.to_string()]).unwrap_or_default())
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let column = ctx.get_string("column")?;
        let name = ctx.get_string("operation")?;
        let op = TextOp::parse(name)
            .ok_or_else(|| ctx.config_error(format!("STRING_TRANSFORM operation '{}' is not supported", name)))?;
        let idx = ctx.column_index(input, column)?;

        let values = input
            .column_values(idx)
            .map(|value| {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let text = value.to_text();
                Ok(match op {
                    TextOp::Trim => Value::String(text.trim().to_string()),
                    TextOp::Lowercase => Value::String(text.to_lowercase()),
                    TextOp::Uppercase => Value::String(text.to_uppercase()),
                    TextOp::Title => Value::String(title_case(&text)),
                    TextOp::RemoveSpaces => Value::String(text.replace(' ', "")),
                    TextOp::CleanPhone => {
                        Value::String(text.chars().filter(char::is_ascii_digit).collect())
                    }
                    TextOp::ParseCurrency => {
                        let cleaned = CURRENCY_RE.replace_all(&text, "");
                        match cleaned.parse::<f64>() {
                            Ok(amount) => Value::Float(amount),
                            Err(_) => {
                                return Err(ctx.operator_error(format!(
                                    "cannot parse '{}' in '{}' as a currency amount",
                                    text, column
                                )))
                            }
                        }
                    }
                    TextOp::ValidateEmail if EMAIL_RE.is_match(&text) => value.clone(),
                    TextOp::ValidateEmail => Value::Null,
                })
            })
            .collect::<ExecutionResult<Vec<_>>>()?;

        let data = input.with_column(column, values).map_err(|e| ctx.dataset_error(e))?;
        Ok(NodeOutput::dataset(data, format!("Applied {} to {}", name, column)))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}
