//! Delimited text files through the `csv` crate.

use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::{IoError, IoResult};
use crate::core::types::{DataType, Value};
use std::path::Path;

fn delimiter(options: &NodeConfig, location: &str) -> IoResult<u8> {
    let text = options.str("delimiter").unwrap_or(",");
    match text.as_bytes() {
        [byte] => Ok(*byte),
        _ if text == "\\t" => Ok(b'\t'),
        _ => Err(IoError::InvalidLocation {
            location: location.to_string(),
            reason: format!("delimiter must be a single character, got '{}'", text),
        }),
    }
}

fn check_encoding(options: &NodeConfig) -> IoResult<()> {
    match options.str("encoding") {
        None => Ok(()),
        Some(encoding) => match encoding.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" | "" => Ok(()),
            _ => Err(IoError::UnsupportedEncoding(encoding.to_string())),
        },
    }
}

/// Read a delimited file, inferring one type per column.
pub(crate) fn read(path: &Path, options: &NodeConfig) -> IoResult<Dataset> {
    let location = path.display().to_string();
    check_encoding(options)?;
    let has_header = options.bool("has_header").unwrap_or(true);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter(options, &location)?)
        .has_headers(has_header)
        .from_path(path)?;

    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    let names: Vec<String> = if has_header {
        reader.headers()?.iter().map(|h| h.trim().to_string()).collect()
    } else {
        let width = records.first().map(|r| r.len()).unwrap_or(0);
        (0..width).map(|i| format!("column_{}", i)).collect()
    };

    let types: Vec<DataType> = (0..names.len())
        .map(|idx| DataType::infer_from_text(records.iter().map(move |r| r.get(idx).unwrap_or(""))))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            types
                .iter()
                .enumerate()
                .map(|(idx, dtype)| Value::parse_text(record.get(idx).unwrap_or(""), *dtype))
                .collect()
        })
        .collect();

    Ok(Dataset::new(names, rows)?)
}

/// Write a dataset with a header row. Nulls are empty fields.
pub(crate) fn write(data: &Dataset, path: &Path, options: &NodeConfig) -> IoResult<()> {
    let location = path.display().to_string();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter(options, &location)?)
        .from_path(path)?;

    writer.write_record(data.columns().iter().map(|c| c.name.as_str()))?;
    for row in data.rows() {
        writer.write_record(row.iter().map(Value::to_text))?;
    }
    writer.flush()?;
    Ok(())
}
