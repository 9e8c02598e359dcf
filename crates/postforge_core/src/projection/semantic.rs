//! Recency-bounded history projection.
//!
//! This is a stub standing in for similarity search: it returns the `top_k`
//! most recent traces and ignores `threshold` and the query text. Callers may
//! rely only on "bounded recent history"; a nearest-neighbour implementation
//! can replace it behind the same signature.

use super::{ProjectionStrategy, View};
use crate::backend::StorageResult;
use crate::model::trace::HistoryQuery;
use crate::state::UniversalState;
use log::debug;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticProjection {
    pub threshold: f64,
    pub top_k: u32,
}

impl SemanticProjection {
    pub fn new(threshold: f64, top_k: u32) -> Self {
        Self { threshold, top_k }
    }
}

impl ProjectionStrategy for SemanticProjection {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn project(&self, state: &UniversalState, query: Option<&str>) -> StorageResult<View> {
        let history = if self.top_k == 0 {
            Vec::new()
        } else {
            state.query_history(&HistoryQuery::recent(self.top_k))?
        };
        debug!(
            "event=projection module=projection status=ok strategy=semantic mode=recency top_k={} count={}",
            self.top_k,
            history.len()
        );

        let results = history
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut view = View::new();
        view.insert("count".to_string(), Value::from(results.len()));
        view.insert("results".to_string(), Value::Array(results));
        view.insert("mode".to_string(), Value::String("recency".to_string()));
        view.insert(
            "query".to_string(),
            query.map_or(Value::Null, |text| Value::String(text.to_string())),
        );
        view.insert("threshold".to_string(), Value::from(self.threshold));
        view.insert("top_k".to_string(), Value::from(self.top_k));
        Ok(view)
    }
}
