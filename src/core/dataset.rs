//! In-memory tabular datasets.
//!
//! A [`Dataset`] is an ordered list of named, typed columns and a row-major
//! sequence of values. Datasets are immutable once produced: every reshaping
//! method returns a new dataset and leaves the receiver untouched.

use crate::core::error::DatasetError;
use crate::core::stats;
use crate::core::types::{DataType, Value};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A named column and the type inferred from its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its dataset
    pub name: String,
    /// Column type
    pub dtype: DataType,
}

/// An in-memory table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset from column names and rows.
    ///
    /// Fails when a row's width differs from the number of columns or when
    /// a column name repeats. Column types are inferred from the values.
    pub fn new(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        let mut seen = IndexSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(DatasetError::DuplicateColumn(name.clone()));
            }
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(DatasetError::RowWidth {
                    row: index,
                    expected: names.len(),
                    found: row.len(),
                });
            }
        }
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                dtype: DataType::infer(rows.iter().map(|row| &row[idx])),
                name,
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Build a dataset from a slice of JSON objects.
    ///
    /// Columns appear in first-seen key order; keys missing from a record
    /// are null in that row.
    pub fn from_json_records(records: &[JsonValue]) -> Result<Self, DatasetError> {
        let mut names: IndexSet<String> = IndexSet::new();
        for (index, record) in records.iter().enumerate() {
            let object = record
                .as_object()
                .ok_or(DatasetError::InvalidRecord { index })?;
            names.extend(object.keys().cloned());
        }
        let rows = records
            .iter()
            .filter_map(JsonValue::as_object)
            .map(|object| {
                names
                    .iter()
                    .map(|name| object.get(name).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(names.into_iter().collect(), rows)
    }

    /// Convert rows into JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, JsonValue> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.name.clone(), value.to_json()))
                    .collect();
                JsonValue::Object(object)
            })
            .collect()
    }

    /// Get the column definitions.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get the column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Get the position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Get the type of a column.
    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.dtype)
    }

    /// Get the rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the values of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Finite numeric values of one column, skipping everything else.
    pub fn numeric_values(&self, index: usize) -> Vec<f64> {
        self.column_values(index).filter_map(Value::as_float).collect()
    }

    /// Names from `required` that this dataset does not have, in order.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in required {
            if !self.has_column(name) && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
        missing
    }

    /// New dataset with the same column names and different rows.
    pub fn with_rows(&self, rows: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        Self::new(self.column_names(), rows)
    }

    /// New dataset keeping only the rows for which `keep` returns true.
    pub fn retain_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Self {
        let rows: Vec<Vec<Value>> = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| Column {
                name: column.name.clone(),
                dtype: DataType::infer(rows.iter().map(|row| &row[idx])),
            })
            .collect();
        Self { columns, rows }
    }

    /// New dataset with `name` set to `values`.
    ///
    /// Replaces the column in place when it exists, appends it otherwise.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self, DatasetError> {
        if values.len() != self.rows.len() {
            return Err(DatasetError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut names = self.column_names();
        let mut rows = self.rows.clone();
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                names.push(name.to_string());
                for (row, value) in rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Self::new(names, rows)
    }

    /// New dataset with the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        let mut index = 0;
        self.retain_rows(|_| {
            index += 1;
            index <= n
        })
    }

    /// Consume the dataset, returning column names and rows.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        let names = self.columns.into_iter().map(|c| c.name).collect();
        (names, self.rows)
    }

    /// Per-column statistics with up to `sample_rows` rows of sample data.
    pub fn profile(&self, sample_rows: usize) -> DatasetProfile {
        let total_rows = self.rows.len();
        let mut column_stats = IndexMap::new();

        for (idx, column) in self.columns.iter().enumerate() {
            let null_count = self.column_values(idx).filter(|v| v.is_null()).count();
            let unique_count = self
                .column_values(idx)
                .filter(|v| !v.is_null())
                .map(Value::key)
                .collect::<IndexSet<_>>()
                .len();
            let sample_values = self
                .column_values(idx)
                .filter(|v| !v.is_null())
                .take(5)
                .map(Value::to_json)
                .collect();
            let numeric = if column.dtype.is_numeric() {
                self.numeric_values(idx)
            } else {
                Vec::new()
            };
            let bounds = stats::min_max(&numeric);

            column_stats.insert(
                column.name.clone(),
                ColumnProfile {
                    dtype: column.dtype,
                    null_count,
                    null_percent: if total_rows == 0 {
                        0.0
                    } else {
                        null_count as f64 / total_rows as f64 * 100.0
                    },
                    unique_count,
                    sample_values,
                    min: bounds.map(|(lo, _)| lo),
                    max: bounds.map(|(_, hi)| hi),
                    mean: stats::mean(&numeric),
                    median: stats::median(&numeric),
                },
            );
        }

        DatasetProfile {
            total_rows,
            total_columns: self.columns.len(),
            columns: self.column_names(),
            column_stats,
            sample_data: self.head(sample_rows).to_json_records(),
        }
    }
}

/// Summary statistics of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Number of rows
    pub total_rows: usize,
    /// Number of columns
    pub total_columns: usize,
    /// Column names in order
    pub columns: Vec<String>,
    /// Statistics per column
    pub column_stats: IndexMap<String, ColumnProfile>,
    /// Leading rows as JSON records
    pub sample_data: Vec<JsonValue>,
}

/// Statistics for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Inferred type
    pub dtype: DataType,
    /// Number of missing values
    pub null_count: usize,
    /// Missing values as a percentage of rows
    pub null_percent: f64,
    /// Number of distinct non-missing values
    pub unique_count: usize,
    /// Up to five non-missing values
    pub sample_values: Vec<JsonValue>,
    /// Minimum of a numeric column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum of a numeric column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Mean of a numeric column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Median of a numeric column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
}
