//! JSON documents and JSON Lines.

use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::{DatasetError, IoResult};
use crate::core::types::Value;
use indexmap::IndexSet;
use serde_json::{Map, Value as JsonValue};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read a JSON file.
///
/// Accepts an array of records, `{"data": [...]}`, columns as arrays
/// (`{"a": [1, 2]}`) or columns keyed by row index (`{"a": {"0": 1}}`).
/// With `lines: true` every non-empty line is one record.
pub(crate) fn read(path: &Path, options: &NodeConfig) -> IoResult<Dataset> {
    let text = std::fs::read_to_string(path)?;
    if options.bool("lines").unwrap_or(false) {
        let records = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<JsonValue>, _>>()?;
        return Ok(Dataset::from_json_records(&records)?);
    }
    let value: JsonValue = serde_json::from_str(&text)?;
    Ok(dataset_from_document(value)?)
}

/// Interpret a parsed document as a dataset.
pub(crate) fn dataset_from_document(value: JsonValue) -> Result<Dataset, DatasetError> {
    match value {
        JsonValue::Array(records) => Dataset::from_json_records(&records),
        JsonValue::Object(mut object) => match object.remove("data") {
            Some(JsonValue::Array(records)) if object.is_empty() => Dataset::from_json_records(&records),
            Some(other) => {
                object.insert("data".to_string(), other);
                from_columns(object)
            }
            None => from_columns(object),
        },
        _ => Err(DatasetError::InvalidRecord { index: 0 }),
    }
}

fn from_columns(object: Map<String, JsonValue>) -> Result<Dataset, DatasetError> {
    if object.values().all(JsonValue::is_array) {
        let expected = object.values().filter_map(JsonValue::as_array).map(Vec::len).next().unwrap_or(0);
        let mut names = Vec::with_capacity(object.len());
        let mut columns = Vec::with_capacity(object.len());
        for (name, values) in &object {
            let values = values.as_array().map(Vec::as_slice).unwrap_or_default();
            if values.len() != expected {
                return Err(DatasetError::LengthMismatch {
                    column: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
            names.push(name.clone());
            columns.push(values);
        }
        let rows = (0..expected)
            .map(|i| columns.iter().map(|c| Value::from_json(&c[i])).collect())
            .collect();
        return Dataset::new(names, rows);
    }

    if object.values().all(JsonValue::is_object) {
        let mut index: IndexSet<&str> = IndexSet::new();
        for cells in object.values().filter_map(JsonValue::as_object) {
            index.extend(cells.keys().map(String::as_str));
        }
        let names = object.keys().cloned().collect();
        let rows = index
            .iter()
            .map(|key| {
                object
                    .values()
                    .map(|cells| cells.get(*key).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        return Dataset::new(names, rows);
    }

    // a lone object is a single record
    Dataset::from_json_records(&[JsonValue::Object(object)])
}

/// Write records as a pretty JSON array, or JSON Lines with `lines: true`.
pub(crate) fn write(data: &Dataset, path: &Path, options: &NodeConfig) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let records = data.to_json_records();
    if options.bool("lines").unwrap_or(false) {
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
    } else {
        serde_json::to_writer_pretty(&mut writer, &records)?;
    }
    writer.flush()?;
    Ok(())
}
