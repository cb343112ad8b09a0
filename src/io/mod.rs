//! Tabular I/O providers.
//!
//! Sources and sinks never touch files, databases or the network directly:
//! they go through a [`TabularIo`] handed to the executor at construction.
//! [`LocalIo`] is the provider for local files, SQLite and HTTP endpoints.

pub mod local;
mod delimited;
mod json;
mod database;
mod http;

pub use local::LocalIo;

use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::IoResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage formats a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Delimited text
    Csv,
    /// Spreadsheet workbook
    Excel,
    /// JSON records
    Json,
    /// Relational database table or query
    Database,
    /// HTTP endpoint exchanging JSON
    Api,
}

impl DataFormat {
    /// Get a human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DataFormat::Csv => "CSV",
            DataFormat::Excel => "Excel",
            DataFormat::Json => "JSON",
            DataFormat::Database => "database",
            DataFormat::Api => "API",
        }
    }

    /// File extension for file-backed formats.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            DataFormat::Csv => Some("csv"),
            DataFormat::Excel => Some("xlsx"),
            DataFormat::Json => Some("json"),
            DataFormat::Database | DataFormat::Api => None,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A provider that reads and writes whole datasets.
///
/// `location` is format specific: a file path for file formats, a
/// connection string for databases and an endpoint URL for APIs. `options`
/// is the node configuration, from which providers read format options
/// such as `delimiter`, `query` or `headers`.
pub trait TabularIo: Send + Sync {
    /// Load a dataset.
    fn load(&self, location: &str, format: DataFormat, options: &NodeConfig) -> IoResult<Dataset>;

    /// Persist a dataset, returning the final location.
    fn write(
        &self,
        data: &Dataset,
        location: &str,
        format: DataFormat,
        options: &NodeConfig,
    ) -> IoResult<String>;
}
