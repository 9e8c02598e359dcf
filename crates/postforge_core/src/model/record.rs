//! Record model shared by all storage backends.
//!
//! # Invariants
//! - `StoredValue::Data` must round-trip through every durable backend.
//! - `StoredValue::Live` is held by reference and only survives in the
//!   in-process backend; durable backends persist its `fields()` snapshot.

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Side-channel metadata attached to a record (entity type, tags, run id).
pub type Metadata = Map<String, Value>;

/// Flat equality filter. Which fields are matchable depends on the backend.
pub type Filter = Map<String, Value>;

/// Metadata field carrying the logical entity type of a record.
pub const ENTITY_TYPE_FIELD: &str = "entity_type";
/// Metadata field stamped while a Universal State run is active.
pub const RUN_ID_FIELD: &str = "run_id";

/// Built-in entity type names used by the default routing table.
pub mod entity {
    pub const TRACE: &str = "trace";
    pub const EVENT: &str = "event";
    pub const PROMPT: &str = "prompt";
    pub const BRIEF: &str = "brief";
    pub const IDEA: &str = "idea";
    pub const NARRATIVE: &str = "narrative";
    pub const BRAND: &str = "brand";
    pub const PALETTE: &str = "palette";
    pub const TYPOGRAPHY: &str = "typography";
}

/// Capability interface for live objects held by the in-process backend.
///
/// Implementors expose the fields that filters and projections may read,
/// instead of those readers inspecting the object by reflection.
pub trait LiveObject: Debug + Send + Sync {
    /// Field snapshot used for query matching and durable persistence.
    fn fields(&self) -> Map<String, Value>;

    /// Human-readable context rendering preferred by episodic projections.
    fn format_context(&self) -> Option<String> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Payload stored under one key.
#[derive(Debug, Clone)]
pub enum StoredValue {
    Data(Value),
    Live(Arc<dyn LiveObject>),
}

impl StoredValue {
    pub fn live(object: impl LiveObject + 'static) -> Self {
        Self::Live(Arc::new(object))
    }

    /// Returns the JSON shape of this value (live objects via `fields()`).
    pub fn to_json(&self) -> Value {
        match self {
            Self::Data(value) => value.clone(),
            Self::Live(object) => Value::Object(object.fields()),
        }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Live(_) => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Borrows the concrete live object when this value holds a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Live(object) => object.as_any().downcast_ref::<T>(),
            Self::Data(_) => None,
        }
    }

    /// Reads one field for filter matching.
    ///
    /// Data values only expose fields when they are JSON objects.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Self::Data(Value::Object(map)) => map.get(name).cloned(),
            Self::Data(_) => None,
            Self::Live(object) => object.fields().get(name).cloned(),
        }
    }
}

impl PartialEq for StoredValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(left), Self::Data(right)) => left == right,
            (Self::Live(left), Self::Live(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<Arc<dyn LiveObject>> for StoredValue {
    fn from(value: Arc<dyn LiveObject>) -> Self {
        Self::Live(value)
    }
}

/// One stored record as returned by `query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: StoredValue,
    pub metadata: Metadata,
}

impl Record {
    pub fn new(key: impl Into<String>, value: StoredValue, metadata: Metadata) -> Self {
        Self {
            key: key.into(),
            value,
            metadata,
        }
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.metadata.get(ENTITY_TYPE_FIELD).and_then(Value::as_str)
    }
}

/// Fields stamped by the storage layer itself; filters resolve them from
/// record metadata before the value.
pub(crate) fn is_routing_field(field: &str) -> bool {
    field == ENTITY_TYPE_FIELD || field == RUN_ID_FIELD
}

/// Returns whether `candidate` satisfies one equality filter entry.
pub(crate) fn matches_value(candidate: Option<&Value>, expected: &Value) -> bool {
    candidate.is_some_and(|value| value == expected)
}
