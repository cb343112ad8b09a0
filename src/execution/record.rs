//! Execution records and the sinks that collect them.
//!
//! Every node a run attempts produces exactly one record. Pipeline-level
//! events, such as a definition rejected before any node ran, produce a
//! record without a node ID.

use crate::core::error::NodeId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Severity of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// A node completed
    Info,
    /// Suspicious but not fatal
    Warning,
    /// A node or the pipeline failed
    Error,
    /// Diagnostic detail
    Debug,
}

impl Severity {
    /// Wire name of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Debug => "DEBUG",
        }
    }

    /// Matching level of the `log` facade.
    pub fn level(&self) -> log::Level {
        match self {
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
            Severity::Debug => log::Level::Debug,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a run's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The run this record belongs to.
    pub run_id: String,
    /// The node, or `None` for pipeline-level events.
    pub node_id: Option<NodeId>,
    /// How serious the event is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Rows of the primary input, when the node had one.
    pub rows_in: Option<usize>,
    /// Rows of the produced dataset, when the node produced one.
    pub rows_out: Option<usize>,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Create a pipeline-level record stamped now.
    pub fn new(run_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            node_id: None,
            severity,
            message: message.into(),
            rows_in: None,
            rows_out: None,
            timestamp: Utc::now(),
        }
    }

    /// Attribute the record to a node.
    pub fn for_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Set the input row count.
    pub fn with_rows_in(mut self, rows: Option<usize>) -> Self {
        self.rows_in = rows;
        self
    }

    /// Set the output row count.
    pub fn with_rows_out(mut self, rows: Option<usize>) -> Self {
        self.rows_out = rows;
        self
    }

    /// Whether this record reports a failure.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Append-only destination for execution records.
///
/// Appending cannot fail from the caller's point of view; a sink that
/// loses a record reports it through the `log` facade instead.
pub trait LogSink: Send + Sync {
    /// Append one record.
    fn append(&self, record: ExecutionRecord);
}

/// Keeps records in memory, in append order.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemoryLogSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records so far.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    /// Records attributed to `node_id`.
    pub fn records_for(&self, node_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.node_id.as_ref().is_some_and(|id| id.as_str() == node_id))
            .cloned()
            .collect()
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, record: ExecutionRecord) {
        self.records.lock().push(record);
    }
}

/// Forwards records to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn append(&self, record: ExecutionRecord) {
        let node = record
            .node_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("pipeline");
        log::log!(
            target: "etlgraph::records",
            record.severity.level(),
            "[{}] {}: {}",
            record.run_id,
            node,
            record.message
        );
    }
}

/// Appends records to a file as JSON Lines.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl LogSink for JsonLinesSink {
    fn append(&self, record: ExecutionRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("dropping execution record: {}", e);
                return;
            }
        };
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            log::warn!("failed to write execution record: {}", e);
        }
    }
}

impl fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = ExecutionRecord::new("r1", Severity::Warning, "careful")
            .for_node(NodeId::from("t"))
            .with_rows_in(Some(3));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["severity"], "WARNING");
        assert_eq!(value["node_id"], "t");
        assert_eq!(value["rows_in"], 3);
        assert!(value["rows_out"].is_null());

        let back: ExecutionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryLogSink::new();
        assert!(sink.is_empty());
        sink.append(ExecutionRecord::new("r", Severity::Info, "one").for_node(NodeId::from("a")));
        sink.append(ExecutionRecord::new("r", Severity::Error, "two"));
        sink.append(ExecutionRecord::new("r", Severity::Info, "three").for_node(NodeId::from("a")));

        let messages: Vec<_> = sink.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
        assert_eq!(sink.records_for("a").len(), 2);
        assert!(sink.records()[1].is_error());
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        {
            let sink = JsonLinesSink::create(&path).unwrap();
            sink.append(ExecutionRecord::new("r", Severity::Info, "first"));
        }
        let sink = JsonLinesSink::create(&path).unwrap();
        sink.append(ExecutionRecord::new("r", Severity::Debug, "second"));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<ExecutionRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].severity, Severity::Debug);
    }
}
