//! Source operators: load a dataset through the I/O provider.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::error::ExecutionResult;
use crate::core::node::{Category, NodeOutput, Operator, OperatorMetadata};
use crate::io::DataFormat;
use crate::operators::registry::OperatorRegistry;

/// Register source operators.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(FileSource::csv()));
    registry.register(|| Box::new(FileSource::excel()));
    registry.register(|| Box::new(FileSource::json()));
    registry.register(|| Box::new(DatabaseSource));
    registry.register(|| Box::new(ApiSource));
}

fn loaded(ctx: &ExecutionContext<'_>, location: &str, format: DataFormat) -> ExecutionResult<NodeOutput> {
    let data = ctx
        .io()?
        .load(location, format, ctx.config())
        .map_err(|e| ctx.io_error(e))?;
    let message = format!("Loaded {} rows", data.row_count());
    Ok(NodeOutput::dataset(data, message))
}

/// Load a file from the upload area.
///
/// One type serves every file format; the format decides the kind tag.
#[derive(Debug, Clone)]
pub struct FileSource {
    kind: &'static str,
    name: &'static str,
    format: DataFormat,
}

impl FileSource {
    /// `CSV_SOURCE`
    pub fn csv() -> Self {
        Self {
            kind: "CSV_SOURCE",
            name: "CSV File",
            format: DataFormat::Csv,
        }
    }

    /// `EXCEL_SOURCE`
    pub fn excel() -> Self {
        Self {
            kind: "EXCEL_SOURCE",
            name: "Excel File",
            format: DataFormat::Excel,
        }
    }

    /// `JSON_SOURCE`
    pub fn json() -> Self {
        Self {
            kind: "JSON_SOURCE",
            name: "JSON File",
            format: DataFormat::Json,
        }
    }
}

impl Operator for FileSource {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder(self.kind, self.name)
            .description(format!("Read a {} file", self.format))
            .category(Category::Source)
            .requires("file_path")
            .tags(["file", "input"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.get("file_path") {
            Some(value) if !value.is_string() && !value.is_null() => {
                vec!["'file_path' must be a string".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let path = ctx.get_string("file_path")?;
        loaded(ctx, path, self.format)
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Read a table, or the result of a query, from a database.
#[derive(Debug, Clone)]
pub struct DatabaseSource;

impl Operator for DatabaseSource {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("DB_SOURCE", "Database")
            .description("Read a table or query result from a database")
            .category(Category::Source)
            .requires("connection_string")
            .requires_any(["table_name", "query"])
            .tags(["database", "sql", "input"])
            .build()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let connection = ctx.get_string("connection_string")?;
        loaded(ctx, connection, DataFormat::Database)
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Fetch records from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ApiSource;

impl Operator for ApiSource {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("API_SOURCE", "REST API")
            .description("Fetch JSON records from an HTTP endpoint")
            .category(Category::Source)
            .requires("endpoint")
            .tags(["http", "rest", "input"])
            .build()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let endpoint = ctx.get_string("endpoint")?;
        loaded(ctx, endpoint, DataFormat::Api)
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::Dataset;
    use crate::core::error::{IoError, IoResult, NodeId};
    use crate::io::TabularIo;
    use crate::operators::builtin::testing::dataset;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FixedIo {
        data: Dataset,
        calls: Mutex<Vec<(String, DataFormat)>>,
    }

    impl TabularIo for FixedIo {
        fn load(&self, location: &str, format: DataFormat, _options: &NodeConfig) -> IoResult<Dataset> {
            self.calls.lock().push((location.to_string(), format));
            if location == "missing.csv" {
                return Err(IoError::NotFound(location.to_string()));
            }
            Ok(self.data.clone())
        }

        fn write(&self, _: &Dataset, _: &str, _: DataFormat, _: &NodeConfig) -> IoResult<String> {
            unreachable!()
        }
    }

    fn io() -> FixedIo {
        FixedIo {
            data: dataset(json!([{"a": 1}, {"a": 2}])),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn execute(operator: &dyn Operator, io: &FixedIo, config: serde_json::Value) -> ExecutionResult<NodeOutput> {
        let id = NodeId::from("s");
        let config = NodeConfig::from_json(config);
        let kind = operator.metadata().kind;
        let ctx = ExecutionContext::new(&id, &kind, &config).with_io(io);
        operator.execute(&ctx)
    }

    #[test]
    fn test_csv_source_loads_through_provider() {
        let io = io();
        let output = execute(&FileSource::csv(), &io, json!({"file_path": "in.csv"})).unwrap();
        assert_eq!(output.message(), "Loaded 2 rows");
        assert_eq!(io.calls.lock()[0], ("in.csv".to_string(), DataFormat::Csv));
    }

    #[test]
    fn test_provider_failure_is_io_error() {
        let io = io();
        let error = execute(&FileSource::csv(), &io, json!({"file_path": "missing.csv"})).unwrap_err();
        assert_eq!(error.kind(), "IOError");
        assert!(error.to_string().contains("missing.csv"));
    }

    #[test]
    fn test_database_source_uses_connection_string() {
        let io = io();
        execute(&DatabaseSource, &io, json!({"connection_string": "sqlite://db", "table_name": "t"})).unwrap();
        assert_eq!(io.calls.lock()[0], ("sqlite://db".to_string(), DataFormat::Database));
    }

    #[test]
    fn test_missing_path_is_config_error() {
        let io = io();
        let error = execute(&FileSource::json(), &io, json!({})).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");
        assert!(error.to_string().contains("JSON_SOURCE requires 'file_path'"));
    }

    #[test]
    fn test_metadata_requirements() {
        let metadata = DatabaseSource.metadata();
        assert_eq!(metadata.category, Category::Source);
        assert_eq!(metadata.required_keys(), vec!["connection_string", "table_name", "query"]);
        assert_eq!(FileSource::excel().metadata().kind, "EXCEL_SOURCE");
    }
}
