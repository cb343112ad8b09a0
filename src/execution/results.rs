//! Per-run storage of node outputs.

use crate::core::dataset::Dataset;
use crate::core::error::NodeId;
use indexmap::IndexMap;

/// Datasets produced so far in one run, keyed by node.
///
/// Owned by a single run. Only source and transform nodes store results;
/// sinks report a location instead.
#[derive(Debug, Default)]
pub struct ResultStore {
    datasets: IndexMap<NodeId, Dataset>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the output of `node_id`, replacing any previous one.
    pub fn insert(&mut self, node_id: NodeId, data: Dataset) {
        self.datasets.insert(node_id, data);
    }

    /// Output of `node_id`, if it produced one.
    pub fn get(&self, node_id: &str) -> Option<&Dataset> {
        self.datasets.get(node_id)
    }

    /// Whether `node_id` has a stored output.
    pub fn contains(&self, node_id: &str) -> bool {
        self.datasets.contains_key(node_id)
    }

    /// Number of stored outputs.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Node IDs in the order their results were stored.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.datasets.keys()
    }
}
