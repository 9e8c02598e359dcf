//! Write-through cache owned by one `UniversalState`.
//!
//! # Invariants
//! - Entries are keyed `"<entity_type>:<key>"`.
//! - The cache never talks to a backend; `UniversalState` decides when to
//!   refresh, populate or evict.

use crate::model::record::StoredValue;
use std::collections::HashMap;

/// Builds the cache key for one record.
pub fn cache_key(entity_type: &str, key: &str) -> String {
    format!("{entity_type}:{key}")
}

#[derive(Debug, Default)]
pub struct StateCache {
    entries: HashMap<String, StoredValue>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: &str, key: &str) -> Option<&StoredValue> {
        self.entries.get(&cache_key(entity_type, key))
    }

    pub fn put(&mut self, entity_type: &str, key: &str, value: StoredValue) {
        self.entries.insert(cache_key(entity_type, key), value);
    }

    /// Returns `true` when an entry was evicted.
    pub fn evict(&mut self, entity_type: &str, key: &str) -> bool {
        self.entries.remove(&cache_key(entity_type, key)).is_some()
    }

    pub fn contains(&self, entity_type: &str, key: &str) -> bool {
        self.entries.contains_key(&cache_key(entity_type, key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
