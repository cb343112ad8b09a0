//! Sink operators: persist the input dataset through the I/O provider.

use crate::core::context::{ExecutionContext, NodeConfig};
use crate::core::error::ExecutionResult;
use crate::core::node::{Category, NodeOutput, Operator, OperatorMetadata};
use crate::io::DataFormat;
use crate::operators::registry::OperatorRegistry;

const IF_EXISTS_MODES: &[&str] = &["replace", "append", "fail"];

/// Register sink operators along with their `*_SINK` aliases.
pub fn register(registry: &mut OperatorRegistry) {
    registry.register(|| Box::new(FileSink::csv()));
    registry.register(|| Box::new(FileSink::excel()));
    registry.register(|| Box::new(FileSink::json()));
    registry.register(|| Box::new(DatabaseSink));
    registry.register(|| Box::new(ApiSink));

    for (alias, kind) in [
        ("CSV_SINK", "CSV_LOAD"),
        ("EXCEL_SINK", "EXCEL_LOAD"),
        ("JSON_SINK", "JSON_LOAD"),
        ("DB_SINK", "DB_LOAD"),
        ("API_SINK", "API_LOAD"),
    ] {
        registry.register_alias(alias, kind);
    }
}

/// Write a file into the output area.
#[derive(Debug, Clone)]
pub struct FileSink {
    kind: &'static str,
    name: &'static str,
    format: DataFormat,
    /// Whether a default file name may stand in for `output_path`
    default_name: bool,
}

impl FileSink {
    /// `CSV_LOAD`
    pub fn csv() -> Self {
        Self {
            kind: "CSV_LOAD",
            name: "CSV File",
            format: DataFormat::Csv,
            default_name: true,
        }
    }

    /// `EXCEL_LOAD`, which always needs an explicit `output_path`
    pub fn excel() -> Self {
        Self {
            kind: "EXCEL_LOAD",
            name: "Excel File",
            format: DataFormat::Excel,
            default_name: false,
        }
    }

    /// `JSON_LOAD`
    pub fn json() -> Self {
        Self {
            kind: "JSON_LOAD",
            name: "JSON File",
            format: DataFormat::Json,
            default_name: true,
        }
    }

    fn location(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<String> {
        match ctx.config().str("output_path") {
            Some(path) if !path.is_empty() => Ok(path.to_string()),
            _ if self.default_name => {
                let extension = self.format.extension().unwrap_or("out");
                Ok(format!("{}.{}", ctx.default_output_name(), extension))
            }
            _ => Err(ctx.config_error(format!("{} requires 'output_path'", self.kind))),
        }
    }
}

impl Operator for FileSink {
    fn metadata(&self) -> OperatorMetadata {
        let builder = OperatorMetadata::builder(self.kind, self.name)
            .description(format!("Write the dataset to a {} file", self.format))
            .category(Category::Sink)
            .tags(["file", "output"]);
        if self.default_name {
            builder.build()
        } else {
            builder.requires("output_path").build()
        }
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let location = self.location(ctx)?;
        let written = ctx
            .io()?
            .write(input, &location, self.format, ctx.config())
            .map_err(|e| ctx.io_error(e))?;
        let message = format!("Wrote {} rows to {}", input.row_count(), self.format);
        Ok(NodeOutput::written(written, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Write the dataset into a database table.
#[derive(Debug, Clone)]
pub struct DatabaseSink;

impl Operator for DatabaseSink {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("DB_LOAD", "Database")
            .description("Write the dataset into a database table")
            .category(Category::Sink)
            .requires("connection_string")
            .requires("table_name")
            .tags(["database", "sql", "output"])
            .build()
    }

    fn validate_config(&self, config: &NodeConfig) -> Vec<String> {
        match config.str("if_exists") {
            Some(mode) if !IF_EXISTS_MODES.contains(&mode) => vec![format!(
                "DB_LOAD 'if_exists' must be one of {}, got '{}'",
                IF_EXISTS_MODES.join(", "),
                mode
            )],
            _ => Vec::new(),
        }
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let connection = ctx.get_string("connection_string")?;
        let table = ctx.get_string("table_name")?;
        let written = ctx
            .io()?
            .write(input, connection, DataFormat::Database, ctx.config())
            .map_err(|e| ctx.io_error(e))?;
        let message = format!("Wrote {} rows to database table '{}'", input.row_count(), table);
        Ok(NodeOutput::written(written, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}

/// Send the dataset as a JSON array to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ApiSink;

impl Operator for ApiSink {
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::builder("API_LOAD", "REST API")
            .description("Send the dataset as JSON records to an HTTP endpoint")
            .category(Category::Sink)
            .requires("endpoint")
            .tags(["http", "rest", "output"])
            .build()
    }

    fn execute(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult<NodeOutput> {
        let input = ctx.input()?;
        let endpoint = ctx.get_string("endpoint")?;
        let written = ctx
            .io()?
            .write(input, endpoint, DataFormat::Api, ctx.config())
            .map_err(|e| ctx.io_error(e))?;
        let message = format!("Sent {} rows to API endpoint", input.row_count());
        Ok(NodeOutput::written(written, message))
    }

    fn clone_box(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }
}
