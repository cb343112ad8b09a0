//! Data-dependent column checks.
//!
//! The stages in [`stages`](crate::validation::stages) only see
//! configuration. Whether the columns an operator reads actually exist is
//! known once its inputs are resolved, so the executor calls
//! [`check_input_schema`] right before dispatch.

use crate::core::dataset::Dataset;
use crate::core::error::{ExecutionError, ExecutionResult, NodeId};
use crate::core::node::ColumnRequirements;
use crate::graph::structure::GraphNode;
use crate::io::{DataFormat, TabularIo};
use crate::operators::registry::OperatorRegistry;

/// Check the required columns against the resolved inputs.
///
/// Fails with a schema error naming the missing columns and the ones the
/// input actually has. The primary input is checked first.
pub fn check_input_schema(
    node_id: &NodeId,
    requirements: &ColumnRequirements,
    primary: &Dataset,
    secondary: Option<&Dataset>,
) -> ExecutionResult<()> {
    let missing = primary.missing_columns(&requirements.primary);
    if !missing.is_empty() {
        return Err(ExecutionError::Schema {
            node_id: node_id.clone(),
            missing,
            available: primary.column_names(),
        });
    }
    if let Some(secondary) = secondary {
        let missing = secondary.missing_columns(&requirements.secondary);
        if !missing.is_empty() {
            return Err(ExecutionError::Schema {
                node_id: node_id.clone(),
                missing,
                available: secondary.column_names(),
            });
        }
    }
    Ok(())
}

/// Problems a node would hit reading from `sample`, for interactive preview.
///
/// Only the primary input is checked. Unknown kinds yield no issues; the
/// configuration stage reports those.
pub fn compatibility_issues(node: &GraphNode, registry: &OperatorRegistry, sample: &Dataset) -> Vec<String> {
    let Some(operator) = registry.create(&node.kind) else {
        return Vec::new();
    };
    let missing = sample.missing_columns(&operator.required_columns(&node.config).primary);
    if missing.is_empty() {
        Vec::new()
    } else {
        vec![format!(
            "{} node '{}' requires column(s) {} which don't exist in input",
            node.kind,
            node.id,
            missing.join(", ")
        )]
    }
}

/// Load the first `limit` rows of a file source, if possible.
///
/// Best effort: anything that goes wrong, including a node that is not a
/// file source, yields `None`.
pub fn sample_source(node: &GraphNode, io: &dyn TabularIo, limit: usize) -> Option<Dataset> {
    let format = match node.kind.as_str() {
        "CSV_SOURCE" => DataFormat::Csv,
        "EXCEL_SOURCE" => DataFormat::Excel,
        "JSON_SOURCE" => DataFormat::Json,
        _ => return None,
    };
    let path = node.config.str("file_path").filter(|p| !p.is_empty())?;
    match io.load(path, format, &node.config) {
        Ok(data) => Some(data.head(limit)),
        Err(e) => {
            log::debug!("no sample for node '{}': {}", node.id, e);
            None
        }
    }
}
