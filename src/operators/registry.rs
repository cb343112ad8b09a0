//! Operator registry for managing available operator kinds.

use crate::core::node::{Category, Operator, OperatorMetadata};
use indexmap::IndexMap;
use std::sync::Arc;

/// Factory function for creating operator instances.
pub type OperatorFactory = Arc<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

/// Registry entry containing metadata and factory.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: OperatorFactory,
    /// Cached metadata (avoids creating an instance just to read it).
    pub metadata: OperatorMetadata,
}

/// Registry for all available operator kinds.
///
/// Kinds are the wire tags of node definitions (`CSV_SOURCE`, `FILTER`...).
/// A kind may also be reached through aliases, e.g. `CSV_SINK` for
/// `CSV_LOAD`. Lookups are exact: kinds are case-sensitive.
pub struct OperatorRegistry {
    /// Operators indexed by their kind.
    operators: IndexMap<String, RegistryEntry>,
    /// Alternative names, alias -> canonical kind.
    aliases: IndexMap<String, String>,
    /// Kinds grouped by category.
    categories: IndexMap<Category, Vec<String>>,
}

impl OperatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operators: IndexMap::new(),
            aliases: IndexMap::new(),
            categories: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::operators::builtin::register_all(&mut registry);
        registry
    }

    /// Register an operator kind. A kind registered twice keeps the latest factory.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Operator> + Send + Sync + 'static,
    {
        // Create a temporary instance to get metadata
        let metadata = factory().metadata();
        let kind = metadata.kind.clone();
        let category = metadata.category;

        let entry = RegistryEntry {
            factory: Arc::new(factory),
            metadata,
        };

        if let Some(previous) = self.operators.insert(kind.clone(), entry) {
            if let Some(kinds) = self.categories.get_mut(&previous.metadata.category) {
                kinds.retain(|k| k != &kind);
            }
        }
        self.categories.entry(category).or_default().push(kind);
    }

    /// Register `alias` as another name for `kind`. Fails if `kind` is unknown.
    pub fn register_alias(&mut self, alias: impl Into<String>, kind: &str) -> bool {
        match self.resolve(kind) {
            Some(canonical) => {
                let canonical = canonical.to_string();
                self.aliases.insert(alias.into(), canonical);
                true
            }
            None => false,
        }
    }

    /// Resolve a kind or alias to the canonical kind.
    pub fn resolve<'a>(&'a self, kind: &'a str) -> Option<&'a str> {
        if self.operators.contains_key(kind) {
            return Some(kind);
        }
        self.aliases.get(kind).map(String::as_str)
    }

    /// Create a new instance of an operator by kind or alias.
    pub fn create(&self, kind: &str) -> Option<Box<dyn Operator>> {
        self.get_entry(kind).map(|e| (e.factory)())
    }

    /// Get metadata for a kind without creating an instance.
    pub fn get_metadata(&self, kind: &str) -> Option<&OperatorMetadata> {
        self.get_entry(kind).map(|e| &e.metadata)
    }

    /// Get a registry entry.
    pub fn get_entry(&self, kind: &str) -> Option<&RegistryEntry> {
        self.resolve(kind).and_then(|k| self.operators.get(k))
    }

    /// Check if a kind (or alias) is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.resolve(kind).is_some()
    }

    /// Get all canonical kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(|s| s.as_str())
    }

    /// Aliases pointing at `kind`.
    pub fn aliases_of(&self, kind: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == kind)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Get kinds by category.
    pub fn kinds_by_category(&self, category: &Category) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|kinds| kinds.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Search operators by kind, name, description or tag.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.operators
            .iter()
            .filter(|(_, entry)| {
                let metadata = &entry.metadata;
                metadata.kind.to_lowercase().contains(&query)
                    || metadata.name.to_lowercase().contains(&query)
                    || metadata.description.to_lowercase().contains(&query)
                    || metadata.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .map(|(kind, _)| kind.as_str())
            .collect()
    }

    /// Unregister a kind along with its aliases.
    pub fn unregister(&mut self, kind: &str) -> bool {
        if let Some(entry) = self.operators.shift_remove(kind) {
            if let Some(kinds) = self.categories.get_mut(&entry.metadata.category) {
                kinds.retain(|k| k != kind);
            }
            self.aliases.retain(|_, target| target != kind);
            true
        } else {
            false
        }
    }

    /// Get the total number of registered kinds.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Get metadata grouped by category in pipeline order, each sorted by kind.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&OperatorMetadata>> {
        let mut grouped: IndexMap<Category, Vec<&OperatorMetadata>> = IndexMap::new();

        for category in Category::all() {
            let mut entries: Vec<&OperatorMetadata> = self
                .operators
                .values()
                .map(|e| &e.metadata)
                .filter(|m| m.category == *category)
                .collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort_by(|a, b| a.kind.cmp(&b.kind));
            grouped.insert(*category, entries);
        }

        grouped
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
