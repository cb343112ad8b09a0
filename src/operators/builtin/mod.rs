//! Built-in operator implementations.
//!
//! This module contains the standard operators that ship with etlgraph.

mod source;
mod sink;
mod columns;
mod rows;
mod aggregate;
mod join;
mod numeric;
mod text;
mod temporal;

use crate::operators::registry::OperatorRegistry;

/// Register all built-in operators.
pub fn register_all(registry: &mut OperatorRegistry) {
    source::register(registry);
    columns::register(registry);
    rows::register(registry);
    aggregate::register(registry);
    join::register(registry);
    numeric::register(registry);
    text::register(registry);
    temporal::register(registry);
    sink::register(registry);
}

// Re-export for direct access
pub use source::{ApiSource, DatabaseSource, FileSource};
pub use sink::{ApiSink, DatabaseSink, FileSink};
pub use columns::{Cast, MergeColumns, Rename, Select, SplitColumn};
pub use rows::{DropDuplicates, Filter, Sort};
pub use aggregate::Aggregate;
pub use join::{Join, RIGHT_NODE_KEY};
pub use numeric::{Binning, FillMissing, FilterOutliers, Normalize};
pub use text::StringTransform;
pub use temporal::ExtractDateParts;

/// Render a column list for record messages.
pub(crate) fn join_names(names: &[String]) -> String {
    names.join(", ")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the operator tests.

    use crate::core::context::{ExecutionContext, NodeConfig};
    use crate::core::dataset::Dataset;
    use crate::core::error::{ExecutionResult, NodeId};
    use crate::core::node::{NodeOutput, Operator};
    use crate::core::types::Value;
    use serde_json::Value as JsonValue;

    pub fn dataset(json: JsonValue) -> Dataset {
        let records = json.as_array().cloned().unwrap_or_default();
        Dataset::from_json_records(&records).unwrap()
    }

    pub fn run(operator: &dyn Operator, config: JsonValue, input: &Dataset) -> ExecutionResult<NodeOutput> {
        let id = NodeId::from("t1");
        let config = NodeConfig::from_json(config);
        let kind = operator.metadata().kind;
        let ctx = ExecutionContext::new(&id, &kind, &config).with_input(input);
        operator.execute(&ctx)
    }

    pub fn output(operator: &dyn Operator, config: JsonValue, input: &Dataset) -> Dataset {
        match run(operator, config, input).unwrap() {
            NodeOutput::Dataset { data, .. } => data,
            NodeOutput::Written { location, .. } => panic!("unexpected sink output {}", location),
        }
    }

    pub fn column(data: &Dataset, name: &str) -> Vec<Value> {
        let idx = data.column_index(name).unwrap();
        data.column_values(idx).cloned().collect()
    }

    pub fn static_errors(operator: &dyn Operator, config: JsonValue) -> Vec<String> {
        operator.validate_config(&NodeConfig::from_json(config))
    }
}
