//! In-memory index from caller-chosen definition ids to persisted data
//! elements.
//!
//! Process-scoped: it is rebuilt from nothing on restart. Rebinding an id
//! replaces the previous binding (last writer wins); the old element row
//! stays in the store.

use std::collections::HashMap;

use crate::error::ProvenanceError;
use crate::model::{DataElement, Stored};

#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    bindings: HashMap<String, Stored<DataElement>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id`, returning the binding it replaced.
    pub fn bind(
        &mut self,
        id: impl Into<String>,
        element: Stored<DataElement>,
    ) -> Option<Stored<DataElement>> {
        self.bindings.insert(id.into(), element)
    }

    pub fn resolve(&self, id: &str) -> Result<&Stored<DataElement>, ProvenanceError> {
        self.bindings
            .get(id)
            .ok_or_else(|| ProvenanceError::unknown_definition(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
