//! Single-entity projection with a rendered context string.

use super::{ProjectionStrategy, View};
use crate::backend::StorageResult;
use crate::model::record::StoredValue;
use crate::state::UniversalState;
use log::debug;
use serde_json::Value;

/// View of one entity: `{entity, context, entity_id, entity_type}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodicProjection {
    pub entity_type: String,
    pub entity_id: String,
}

impl EpisodicProjection {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl ProjectionStrategy for EpisodicProjection {
    fn name(&self) -> &'static str {
        "episodic"
    }

    fn project(&self, state: &UniversalState, _query: Option<&str>) -> StorageResult<View> {
        let entity = state.get(&self.entity_type, &self.entity_id)?;
        debug!(
            "event=projection module=projection status=ok strategy=episodic entity_type={} found={}",
            self.entity_type,
            entity.is_some()
        );

        let mut view = View::new();
        view.insert(
            "context".to_string(),
            Value::String(entity.as_ref().map(render_context).unwrap_or_default()),
        );
        view.insert(
            "entity".to_string(),
            entity.as_ref().map(StoredValue::to_json).unwrap_or(Value::Null),
        );
        view.insert(
            "entity_id".to_string(),
            Value::String(self.entity_id.clone()),
        );
        view.insert(
            "entity_type".to_string(),
            Value::String(self.entity_type.clone()),
        );
        Ok(view)
    }
}

/// Renders an entity for prompt context.
///
/// Preference: the entity's own formatter, then a structured JSON dump, then
/// plain stringification for scalars.
pub fn render_context(value: &StoredValue) -> String {
    if let StoredValue::Live(object) = value {
        if let Some(context) = object.format_context() {
            return context;
        }
    }

    match value.to_json() {
        structured @ (Value::Object(_) | Value::Array(_)) => {
            serde_json::to_string_pretty(&structured).unwrap_or_else(|_| structured.to_string())
        }
        Value::String(text) => text,
        Value::Null => String::new(),
        scalar => scalar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::render_context;
    use crate::model::record::{LiveObject, StoredValue};
    use serde_json::{json, Map, Value};
    use std::any::Any;

    #[derive(Debug)]
    struct Persona {
        name: String,
        formatted: bool,
    }

    impl LiveObject for Persona {
        fn fields(&self) -> Map<String, Value> {
            let mut fields = Map::new();
            fields.insert("name".to_string(), json!(self.name));
            fields
        }

        fn format_context(&self) -> Option<String> {
            self.formatted.then(|| format!("Persona: {}", self.name))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn prefers_entity_formatter() {
        let value = StoredValue::live(Persona {
            name: "Ava".to_string(),
            formatted: true,
        });
        assert_eq!(render_context(&value), "Persona: Ava");
    }

    #[test]
    fn falls_back_to_structured_dump_then_plain_text() {
        let live = StoredValue::live(Persona {
            name: "Ava".to_string(),
            formatted: false,
        });
        assert_eq!(render_context(&live), "{\n  \"name\": \"Ava\"\n}");

        let data = StoredValue::from(json!({"tone": "warm"}));
        assert!(render_context(&data).contains("\"tone\": \"warm\""));

        assert_eq!(render_context(&StoredValue::from(json!("raw text"))), "raw text");
        assert_eq!(render_context(&StoredValue::from(json!(42))), "42");
    }
}
