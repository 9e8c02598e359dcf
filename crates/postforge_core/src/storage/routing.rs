//! Entity type to backend routing table.

use crate::backend::{DOCUMENT_BACKEND, IN_PROCESS_BACKEND, RELATIONAL_BACKEND};
use crate::model::record::entity;
use std::collections::BTreeMap;

/// Characters allowed between an entity-type prefix and the rest of a key.
const KEY_PREFIX_SEPARATORS: &[char] = &[':', '_', '/', '-', '.'];

/// Mapping `entity_type -> backend_name`, also used for key-prefix fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<String, String>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in table: trace/event/prompt -> relational, brief/idea/narrative
    /// -> document, brand/palette/typography -> in-process.
    pub fn defaults() -> Self {
        let mut table = Self::empty();
        for entity_type in [entity::TRACE, entity::EVENT, entity::PROMPT] {
            table.insert(entity_type, RELATIONAL_BACKEND);
        }
        for entity_type in [entity::BRIEF, entity::IDEA, entity::NARRATIVE] {
            table.insert(entity_type, DOCUMENT_BACKEND);
        }
        for entity_type in [entity::BRAND, entity::PALETTE, entity::TYPOGRAPHY] {
            table.insert(entity_type, IN_PROCESS_BACKEND);
        }
        table
    }

    /// Merges `overrides` on top of this table, last write wins per type.
    pub fn merge<K, V>(&mut self, overrides: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (entity_type, backend) in overrides {
            self.insert(entity_type, backend);
        }
    }

    pub fn insert(&mut self, entity_type: impl Into<String>, backend: impl Into<String>) {
        self.routes
            .insert(entity_type.into().trim().to_string(), backend.into().trim().to_string());
    }

    pub fn resolve(&self, entity_type: &str) -> Option<&str> {
        self.routes.get(entity_type).map(String::as_str)
    }

    /// Resolves a key by its entity-type prefix (`brief:..`, `trace_..`).
    ///
    /// The longest matching entity type wins, so resolution does not depend on
    /// table iteration order.
    pub fn resolve_key_prefix(&self, key: &str) -> Option<(&str, &str)> {
        self.routes
            .iter()
            .filter(|(entity_type, _)| has_entity_prefix(key, entity_type))
            .max_by_key(|(entity_type, _)| entity_type.len())
            .map(|(entity_type, backend)| (entity_type.as_str(), backend.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|(entity_type, backend)| (entity_type.as_str(), backend.as_str()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn has_entity_prefix(key: &str, entity_type: &str) -> bool {
    if entity_type.is_empty() {
        return false;
    }
    match key.strip_prefix(entity_type) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_PREFIX_SEPARATORS),
        None => false,
    }
}
