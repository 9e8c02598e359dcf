//! In-process backend for live, non-serializable objects.
//!
//! # Invariants
//! - Values are held by reference (`Arc`); nothing is serialized or durable.
//! - Query checks metadata first, then the object's own `fields()`; a filter
//!   field found in neither excludes the object.
//! - No internal locking: callers sharing one instance across threads must
//!   wrap the owning state in a lock.

use super::{validate_key, StorageBackend, StorageResult};
use crate::model::record::{matches_value, Filter, Metadata, Record, StoredValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Slot {
    value: StoredValue,
    metadata: Metadata,
}

/// Session-local object store keyed by record key.
#[derive(Debug, Default)]
pub struct InProcessBackend {
    slots: BTreeMap<String, Slot>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl StorageBackend for InProcessBackend {
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        validate_key(key)?;
        self.slots.insert(
            key.to_string(),
            Slot {
                value,
                metadata: metadata.unwrap_or_default(),
            },
        );
        Ok(key.to_string())
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        Ok(self.slots.get(key).map(|slot| slot.value.clone()))
    }

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>> {
        let records = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                filter.iter().all(|(field, expected)| match slot.metadata.get(field) {
                    Some(found) => found == expected,
                    None => matches_value(slot.value.field(field).as_ref(), expected),
                })
            })
            .map(|(key, slot)| Record::new(key.clone(), slot.value.clone(), slot.metadata.clone()))
            .collect();
        Ok(records)
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        Ok(self.slots.remove(key).is_some())
    }

    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        Ok(self
            .slots
            .keys()
            .filter(|key| prefix.map_or(true, |prefix| key.starts_with(prefix)))
            .cloned()
            .collect())
    }
}
