//! Execution module.
//!
//! This module runs pipeline graphs and records what every node did.

pub mod engine;
pub mod record;
pub mod results;

pub use engine::{ExecutionOutcome, ExecutionStats, PipelineExecutor, RunContext};
pub use record::{ExecutionRecord, JsonLinesSink, LogFacadeSink, LogSink, MemoryLogSink, Severity};
pub use results::ResultStore;
