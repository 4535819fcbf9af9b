//! The classifier registry: identifier -> capability.
//!
//! Classifiers are registered explicitly at engine construction; the
//! router only ever resolves identifiers through this map. A strategy
//! referencing an identifier that was never registered is a structural
//! misconfiguration, surfaced as
//! [`EngineError::UnknownClassifier`](crate::error::EngineError::UnknownClassifier).

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::traits::Classifier;

/// Classifier instances keyed by their [`Classifier::id`].
#[derive(Default)]
pub struct ClassifierRegistry {
    classifiers: HashMap<String, Arc<dyn Classifier>>,
}

impl ClassifierRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a classifier under its own identifier, replacing any
    /// previous registration with the same identifier.
    pub fn register(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifiers
            .insert(classifier.id().to_string(), classifier);
    }

    /// Look up a classifier, or fail with the fatal configuration error.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Classifier>> {
        self.classifiers
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownClassifier(id.to_string()))
    }

    /// Look up a classifier without raising.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Classifier>> {
        self.classifiers.get(id).cloned()
    }

    /// Sorted identifiers of all registered classifiers.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.classifiers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered classifiers.
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    /// Whether no classifiers are registered.
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

impl std::fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRegistry")
            .field("classifiers", &self.ids())
            .finish()
    }
}
