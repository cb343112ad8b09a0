//! Cell values and column types for tabular datasets.
//!
//! Values form a closed set so operators can match exhaustively on what a
//! column holds. Missing data is always represented as [`Value::Null`]; a
//! non-finite float is treated as missing as well.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;

/// A single cell of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// UTF-8 string
    String(String),
    /// Timestamp without timezone
    DateTime(NaiveDateTime),
}

/// Column types, inferred from the values a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Every value in the column is missing
    Null,
    /// Whole numbers
    Integer,
    /// Floating point numbers (also integers mixed with floats)
    Float,
    /// Booleans
    Boolean,
    /// Text, or a mix of incompatible types
    String,
    /// Timestamps
    DateTime,
}

/// Hashable, totally ordered projection of a [`Value`].
///
/// Used wherever rows are grouped or matched by key: aggregation, joins,
/// duplicate detection. Integral floats map to the integer key so that
/// `1` and `1.0` land in the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    /// Missing value
    Null,
    /// Boolean key
    Boolean(bool),
    /// Integer key
    Integer(i64),
    /// Non-integral float key, stored as order-preserving bits
    Float(u64),
    /// Timestamp key
    DateTime(NaiveDateTime),
    /// String key
    String(String),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Canonical text form of timestamps in files and messages.
pub const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Value Implementation
// ============================================================================

impl Value {
    /// Get the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Float(f) if !f.is_finite() => DataType::Null,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
        }
    }

    /// Check whether this value counts as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    /// Check whether this value is an integer or a finite float.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_)) || matches!(self, Value::Float(f) if f.is_finite())
    }

    /// Try to get as integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float (integers convert).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Convert a JSON value into a cell.
    ///
    /// Nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Convert this cell into a JSON value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Integer(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::DateTime(dt) => JsonValue::String(dt.format(DATETIME_TEXT_FORMAT).to_string()),
        }
    }

    /// Render this cell as text for delimited files.
    ///
    /// Missing values render as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) if !f.is_finite() => String::new(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.1}", f),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.format(DATETIME_TEXT_FORMAT).to_string(),
        }
    }

    /// Parse text into a value of the given type, `Null` when it does not parse.
    pub fn parse_text(text: &str, dtype: DataType) -> Value {
        let trimmed = text.trim();
        if trimmed.is_empty() && dtype != DataType::String {
            return Value::Null;
        }
        match dtype {
            DataType::Null => Value::Null,
            DataType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| trimmed.parse::<f64>().map(float_to_integer))
                .unwrap_or(Value::Null),
            DataType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float)
                .unwrap_or(Value::Null),
            DataType::Boolean => parse_bool(trimmed).map(Value::Boolean).unwrap_or(Value::Null),
            DataType::String => {
                if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text.to_string())
                }
            }
            DataType::DateTime => parse_datetime(trimmed, None)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
        }
    }

    /// Coerce this value to another type.
    ///
    /// Values that cannot be represented in the target type become `Null`.
    pub fn cast(&self, target: DataType, format: Option<&str>) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match (target, self) {
            (DataType::Null, _) => Value::Null,
            (DataType::Integer, Value::Integer(i)) => Value::Integer(*i),
            (DataType::Integer, Value::Float(f)) => float_to_integer(*f),
            (DataType::Integer, Value::Boolean(b)) => Value::Integer(*b as i64),
            (DataType::Float, Value::Float(f)) => Value::Float(*f),
            (DataType::Float, Value::Integer(i)) => Value::Float(*i as f64),
            (DataType::Float, Value::Boolean(b)) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (DataType::Boolean, Value::Boolean(b)) => Value::Boolean(*b),
            (DataType::Boolean, Value::Integer(i)) => Value::Boolean(*i != 0),
            (DataType::Boolean, Value::Float(f)) => Value::Boolean(*f != 0.0),
            (DataType::String, other) => Value::String(other.to_text()),
            (DataType::DateTime, Value::DateTime(dt)) => Value::DateTime(*dt),
            (DataType::DateTime, Value::String(s)) => parse_datetime(s.trim(), format)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            (dtype, Value::String(s)) => Value::parse_text(s, dtype),
            _ => Value::Null,
        }
    }

    /// Compare two values when they are comparable.
    ///
    /// Integers and floats compare numerically with each other. Returns
    /// `None` for missing values and for incompatible types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_float()?.partial_cmp(&b.as_float()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total ordering for sorting. Callers place missing values themselves.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match self.compare(other) {
            Some(ordering) => ordering,
            None => self.type_rank().cmp(&other.type_rank()).then_with(|| {
                match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a.total_cmp(&b),
                    _ => Ordering::Equal,
                }
            }),
        }
    }

    /// Hashable key for grouping and matching.
    pub fn key(&self) -> ValueKey {
        match self {
            v if v.is_null() => ValueKey::Null,
            Value::Integer(i) => ValueKey::Integer(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e18 {
                    ValueKey::Integer(*f as i64)
                } else {
                    ValueKey::Float(ordered_bits(*f))
                }
            }
            Value::Boolean(b) => ValueKey::Boolean(*b),
            Value::String(s) => ValueKey::String(s.clone()),
            Value::DateTime(dt) => ValueKey::DateTime(*dt),
            Value::Null => ValueKey::Null,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::DateTime(_) => 3,
            Value::String(_) => 4,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// DataType Implementation
// ============================================================================

impl DataType {
    /// Infer the type of a column from its values. Missing values are ignored.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
        let mut current = DataType::Null;
        for value in values {
            let dtype = value.data_type();
            current = match (current, dtype) {
                (c, DataType::Null) => c,
                (DataType::Null, d) => d,
                (c, d) if c == d => c,
                (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                    DataType::Float
                }
                _ => return DataType::String,
            };
        }
        current
    }

    /// Infer the narrowest type able to hold every piece of text.
    ///
    /// Empty text is missing and ignored. Tries integer, then float, then
    /// boolean, falling back to string.
    pub fn infer_from_text<'a>(texts: impl IntoIterator<Item = &'a str> + Clone) -> DataType {
        let non_empty = || texts.clone().into_iter().map(str::trim).filter(|t| !t.is_empty());
        if non_empty().next().is_none() {
            return DataType::Null;
        }
        if non_empty().all(|t| t.parse::<i64>().is_ok()) {
            DataType::Integer
        } else if non_empty().all(|t| t.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false)) {
            DataType::Float
        } else if non_empty().all(|t| t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false")) {
            DataType::Boolean
        } else {
            DataType::String
        }
    }

    /// Resolve a cast target name.
    pub fn from_cast_name(name: &str) -> Option<DataType> {
        match name.trim().to_lowercase().as_str() {
            "int" | "integer" | "int64" | "int32" => Some(DataType::Integer),
            "float" | "double" | "float64" | "float32" | "number" => Some(DataType::Float),
            "string" | "str" | "text" => Some(DataType::String),
            "datetime" | "date" | "timestamp" | "datetime64" => Some(DataType::DateTime),
            "bool" | "boolean" => Some(DataType::Boolean),
            _ => None,
        }
    }

    /// Whether values of this type are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// SQL column type used when persisting to a table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            DataType::Integer | DataType::Boolean => "INTEGER",
            DataType::Float => "REAL",
            DataType::Null | DataType::String | DataType::DateTime => "TEXT",
        }
    }

    /// Get a human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

/// Parse a timestamp, using `format` when given and common layouts otherwise.
///
/// Date-only text resolves to midnight. RFC 3339 text with an offset is
/// converted to UTC.
pub fn parse_datetime(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(format) = format {
        return NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse common boolean spellings.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn float_to_integer(f: f64) -> Value {
    if f.is_finite() && f.abs() < 9.2e18 {
        Value::Integer(f.trunc() as i64)
    } else {
        Value::Null
    }
}

fn ordered_bits(f: f64) -> u64 {
    let bits = (f + 0.0).to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}
