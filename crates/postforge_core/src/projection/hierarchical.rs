//! Group projection: all entities of one type sharing a context value.

use super::{ProjectionStrategy, View};
use crate::backend::StorageResult;
use crate::model::record::{Filter, Record};
use crate::state::UniversalState;
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// View `{entities: {id -> entity}, count, context_key, context_value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalProjection {
    pub entity_type: String,
    pub context_key: String,
    pub context_value: Value,
}

impl HierarchicalProjection {
    pub fn new(
        entity_type: impl Into<String>,
        context_key: impl Into<String>,
        context_value: impl Into<Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            context_key: context_key.into(),
            context_value: context_value.into(),
        }
    }
}

impl ProjectionStrategy for HierarchicalProjection {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn project(&self, state: &UniversalState, _query: Option<&str>) -> StorageResult<View> {
        let mut filter = Filter::new();
        filter.insert(self.context_key.clone(), self.context_value.clone());
        let records = state.query(Some(&self.entity_type), &filter)?;
        let entities = rekey_records(&self.entity_type, records);
        debug!(
            "event=projection module=projection status=ok strategy=hierarchical entity_type={} count={}",
            self.entity_type,
            entities.len()
        );

        let mut view = View::new();
        view.insert("count".to_string(), Value::from(entities.len()));
        view.insert("entities".to_string(), Value::Object(entities));
        view.insert(
            "context_key".to_string(),
            Value::String(self.context_key.clone()),
        );
        view.insert("context_value".to_string(), self.context_value.clone());
        Ok(view)
    }
}

/// Keys a result sequence so that no entry is silently dropped.
///
/// Each record takes the first free id among: its record key, an id-like
/// value field (`id`, `uuid`, `<entity_type>_id`), its sequential index.
/// If all are taken (duplicate keys across backends), the index is appended.
pub fn rekey_records(entity_type: &str, records: Vec<Record>) -> Map<String, Value> {
    let id_fields = ["id".to_string(), "uuid".to_string(), format!("{entity_type}_id")];
    let mut taken = BTreeSet::new();
    let mut entities = Map::new();

    for (index, record) in records.into_iter().enumerate() {
        let mut candidates = Vec::new();
        if !record.key.is_empty() {
            candidates.push(record.key.clone());
        }
        for field in &id_fields {
            match record.value.field(field) {
                Some(Value::String(id)) if !id.is_empty() => candidates.push(id),
                Some(Value::Number(id)) => candidates.push(id.to_string()),
                _ => {}
            }
        }
        candidates.push(index.to_string());

        let id = match candidates.iter().find(|candidate| !taken.contains(*candidate)) {
            Some(free) => free.clone(),
            None => {
                let mut suffix = index;
                loop {
                    let candidate = format!("{}#{suffix}", candidates[0]);
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                    suffix += 1;
                }
            }
        };
        taken.insert(id.clone());
        entities.insert(id, record.value.to_json());
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::rekey_records;
    use crate::model::record::{Metadata, Record, StoredValue};
    use serde_json::json;

    fn record(key: &str, value: serde_json::Value) -> Record {
        Record::new(key, StoredValue::from(value), Metadata::new())
    }

    #[test]
    fn uses_record_keys_when_unique() {
        let entities = rekey_records(
            "brief",
            vec![record("a", json!({"n": 1})), record("b", json!({"n": 2}))],
        );
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.get("a"), Some(&json!({"n": 1})));
    }

    #[test]
    fn duplicate_keys_fall_back_to_id_field_then_index() {
        let entities = rekey_records(
            "idea",
            vec![
                record("dup", json!({"n": 1})),
                record("dup", json!({"idea_id": "i-7", "n": 2})),
                record("dup", json!({"n": 3})),
            ],
        );

        assert_eq!(entities.len(), 3);
        assert_eq!(entities.get("dup"), Some(&json!({"n": 1})));
        assert_eq!(entities.get("i-7"), Some(&json!({"idea_id": "i-7", "n": 2})));
        assert_eq!(entities.get("2"), Some(&json!({"n": 3})));
    }

    #[test]
    fn entities_without_ids_never_collide() {
        let records = vec![
            record("", json!("x")),
            record("", json!("y")),
            record("0", json!("z")),
        ];
        let entities = rekey_records("brief", records);
        assert_eq!(entities.len(), 3);
    }
}
