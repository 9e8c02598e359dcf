//! Execution trace model.
//!
//! # Invariants
//! - An event always belongs to exactly one trace (`trace_id`).
//! - `parent_id`, when set, names another event of the same trace.
//! - Costs are `None` when the model has no pricing row, never zero-filled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One logical pipeline execution (e.g. generating one post).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub tokens_input_total: i64,
    #[serde(default)]
    pub tokens_output_total: i64,
    #[serde(default)]
    pub tokens_total: i64,
    pub cost_total: Option<f64>,
}

impl Trace {
    /// Creates a trace with a generated id, stamped at the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            name: Some(name.into()),
            user_id: None,
            tenant_id: None,
            tags: Vec::new(),
            metadata: None,
            tokens_input_total: 0,
            tokens_output_total: 0,
            tokens_total: 0,
            cost_total: None,
        }
    }
}

/// One step inside a trace: an LLM call, a tool call, a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub trace_id: String,
    pub parent_id: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Serialized as `type` to match the events table column.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub role: Option<String>,
    pub input_text: Option<String>,
    pub input_json: Option<Value>,
    pub output_text: Option<String>,
    pub output_json: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
    pub tokens_input: Option<i64>,
    pub tokens_output: Option<i64>,
    pub tokens_total: Option<i64>,
    pub cost_input: Option<f64>,
    pub cost_output: Option<f64>,
    pub cost_total: Option<f64>,
    pub quality_score: Option<f64>,
    pub quality_label: Option<String>,
    pub quality_metadata: Option<Value>,
    pub metadata: Option<Value>,
}

impl Event {
    /// Creates an event with a generated id under `trace_id`.
    pub fn new(trace_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), trace_id, kind)
    }

    pub fn with_id(
        id: impl Into<String>,
        trace_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            trace_id: trace_id.into(),
            parent_id: None,
            created_at: chrono::Utc::now().timestamp_millis(),
            kind: kind.into(),
            name: None,
            model: None,
            role: None,
            input_text: None,
            input_json: None,
            output_text: None,
            output_json: None,
            error: None,
            duration_ms: None,
            tokens_input: None,
            tokens_output: None,
            tokens_total: None,
            cost_input: None,
            cost_output: None,
            cost_total: None,
            quality_score: None,
            quality_label: None,
            quality_metadata: None,
            metadata: None,
        }
    }

    /// Token total as logged: explicit value, else input + output.
    pub fn effective_tokens_total(&self) -> Option<i64> {
        self.tokens_total.or(match (self.tokens_input, self.tokens_output) {
            (None, None) => None,
            (input, output) => Some(input.unwrap_or(0) + output.unwrap_or(0)),
        })
    }
}

/// Per-1K-token prices for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_name: String,
    pub price_per_1k_input: f64,
    pub price_per_1k_output: f64,
    pub currency: String,
}

impl ModelPricing {
    pub fn usd(model_name: impl Into<String>, per_1k_input: f64, per_1k_output: f64) -> Self {
        Self {
            model_name: model_name.into(),
            price_per_1k_input: per_1k_input,
            price_per_1k_output: per_1k_output,
            currency: "USD".to_string(),
        }
    }
}

/// Computed event cost split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventCost {
    pub input: f64,
    pub output: f64,
    pub total: f64,
}

impl EventCost {
    /// `price_input_per_1k * tokens_input / 1000 + price_output_per_1k * tokens_output / 1000`.
    pub fn compute(pricing: &ModelPricing, tokens_input: i64, tokens_output: i64) -> Self {
        let input = pricing.price_per_1k_input * tokens_input as f64 / 1000.0;
        let output = pricing.price_per_1k_output * tokens_output as f64 / 1000.0;
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// A trace with all of its events, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDetails {
    pub trace: Trace,
    pub events: Vec<Event>,
}

impl TraceDetails {
    /// Events whose `parent_id` is `event_id`.
    pub fn children_of<'a>(&'a self, event_id: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter(move |event| event.parent_id.as_deref() == Some(event_id))
    }
}

/// Filter and pagination options for trace history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub name: Option<String>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn recent(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}
