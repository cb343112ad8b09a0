//! End-to-end runs through the public API against files on disk.

use etlgraph::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Workspace {
    root: TempDir,
    io: Arc<LocalIo>,
    executor: PipelineExecutor,
    records: Arc<MemoryLogSink>,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let settings = IoSettings {
            upload_dir: root.path().join("uploads"),
            output_dir: root.path().join("outputs"),
            ..IoSettings::default()
        };
        fs::create_dir_all(&settings.upload_dir).unwrap();
        let io = Arc::new(LocalIo::new(settings));
        let executor = PipelineExecutor::with_builtins(io.clone());
        Self {
            root,
            io,
            executor,
            records: Arc::new(MemoryLogSink::new()),
        }
    }

    fn upload(&self, name: &str, contents: &str) {
        fs::write(self.root.path().join("uploads").join(name), contents).unwrap();
    }

    fn outputs(&self) -> &Path {
        self.root.path()
    }

    fn run(&self, definition: &str) -> Result<ExecutionOutcome, EngineError> {
        let run = RunContext::new("it", self.records.clone());
        self.executor.execute_json(definition, &run)
    }
}

const FILTER_PIPELINE: &str = r#"{
    "nodes": [
        {"id": "S", "type": "SOURCE", "subtype": "CSV_SOURCE", "config": {"file_path": "orders.csv"}},
        {"id": "T", "type": "TRANSFORM", "subtype": "FILTER",
         "config": {"column": "amt", "operator": ">", "value": 0}},
        {"id": "L", "type": "LOAD", "subtype": "CSV_SINK", "config": {"output_path": "clean.csv"}}
    ],
    "edges": [{"from": "S", "to": "T"}, {"from": "T", "to": "L"}]
}"#;

#[test]
fn test_filter_pipeline_writes_matching_rows() {
    let ws = Workspace::new();
    ws.upload("orders.csv", "id,amt\n1,5\n2,-1\n3,7\n");

    assert!(etlgraph::validate(FILTER_PIPELINE).is_valid);
    let outcome = ws.run(FILTER_PIPELINE).unwrap();

    let written = ws.outputs().join("outputs").join("clean.csv");
    assert_eq!(outcome.final_location, Some(written.display().to_string()));
    assert_eq!(fs::read_to_string(&written).unwrap(), "id,amt\n1,5\n3,7\n");

    let records = ws.records.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.severity == Severity::Info));
    let rows: Vec<_> = records.iter().map(|r| (r.rows_in, r.rows_out)).collect();
    assert_eq!(rows, vec![(None, Some(3)), (Some(3), Some(2)), (Some(2), None)]);
    assert_eq!(records[1].message, "Filtered by amt > 0");
}

#[test]
fn test_missing_column_stops_before_sink() {
    let ws = Workspace::new();
    ws.upload("orders.csv", "id,amt\n1,5\n");
    let definition = FILTER_PIPELINE.replace(r#""column": "amt""#, r#""column": "price""#);

    let error = ws.run(&definition).unwrap_err();
    assert_eq!(error.kind(), "SchemaError");
    assert!(error.to_string().contains("price"));
    assert!(!ws.outputs().join("outputs").join("clean.csv").exists());

    let records = ws.records.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].node_id, Some(NodeId::from("T")));
    assert_eq!(records[1].severity, Severity::Error);
}

#[test]
fn test_cycle_is_rejected_by_both_validator_and_executor() {
    let ws = Workspace::new();
    let definition = r#"{
        "nodes": [
            {"id": "a", "type": "TRANSFORM", "subtype": "SORT", "config": {"columns": ["x"]}},
            {"id": "b", "type": "TRANSFORM", "subtype": "SORT", "config": {"columns": ["x"]}}
        ],
        "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "a"}]
    }"#;

    let report = etlgraph::validate(definition);
    assert!(report.errors.contains(&"Cycle detected: a → b → a".to_string()));

    let error = ws.run(definition).unwrap_err();
    assert_eq!(error.kind(), "CycleError");
    let records = ws.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].node_id, None);
}

#[test]
fn test_source_outside_upload_dir_is_io_error() {
    let ws = Workspace::new();
    fs::write(ws.outputs().join("secret.csv"), "id,amt\n1,5\n").unwrap();
    let definition = FILTER_PIPELINE.replace("orders.csv", "../secret.csv");

    let error = ws.run(&definition).unwrap_err();
    assert_eq!(error.kind(), "IOError");
    assert_eq!(error.node_id(), Some(&NodeId::from("S")));
}

#[test]
fn test_join_with_tagged_right_input() {
    let ws = Workspace::new();
    ws.upload("customers.csv", "cid,name\n1,Ada\n2,Grace\n");
    ws.upload("orders.json", r#"[{"cid": 2, "amt": 10}, {"cid": 1, "amt": 4}, {"cid": 2, "amt": 1}]"#);
    let definition = r#"{
        "nodes": [
            {"id": "orders", "type": "SOURCE", "subtype": "JSON_SOURCE", "config": {"file_path": "orders.json"}},
            {"id": "customers", "type": "SOURCE", "subtype": "CSV_SOURCE", "config": {"file_path": "customers.csv"}},
            {"id": "j", "type": "TRANSFORM", "subtype": "JOIN",
             "config": {"join_type": "inner", "left_on": "cid", "right_on": "cid"}},
            {"id": "agg", "type": "TRANSFORM", "subtype": "AGGREGATE",
             "config": {"group_by": "name", "aggregations": {"amt": "sum"}}},
            {"id": "out", "type": "LOAD", "subtype": "JSON_LOAD", "config": {"output_path": "totals.json"}}
        ],
        "edges": [
            {"from": "orders", "to": "j"},
            {"from": "customers", "to": "j", "port": "right"},
            {"from": "j", "to": "agg"},
            {"from": "agg", "to": "out"}
        ]
    }"#;

    let report = etlgraph::validate(definition);
    assert!(report.is_valid, "{:?}", report.errors);
    let outcome = ws.run(definition).unwrap();
    assert_eq!(outcome.stats.nodes_executed, 5);
    assert_eq!(outcome.stats.rows_written, 2);

    let text = fs::read_to_string(ws.outputs().join("outputs").join("totals.json")).unwrap();
    let totals: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(totals.as_array().map(Vec::len), Some(2));
    assert_eq!(totals[0]["name"], "Ada");
}

#[test]
fn test_execute_without_sink_returns_no_location() {
    let ws = Workspace::new();
    ws.upload("orders.csv", "id,amt\n1,5\n");
    let definition = r#"{
        "nodes": [{"id": "S", "type": "SOURCE", "subtype": "CSV_SOURCE", "config": {"file_path": "orders.csv"}}],
        "edges": []
    }"#;

    let run = RunContext::new("solo", ws.records.clone());
    let location = etlgraph::execute(definition, ws.io.clone(), &run).unwrap();
    assert_eq!(location, None);

    let records = ws.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rows_out, Some(1));
    assert_eq!(records[0].run_id, "solo");
}
