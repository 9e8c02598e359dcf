//! Universal State: the single storage object upstream pipeline code uses.
//!
//! # Responsibility
//! - Delegate record operations to `StorageManager` behind a local cache.
//! - Carry session context (current run id) for one logical run.
//! - Expose read-only trace history over the relational schema.
//!
//! # Invariants
//! - `store` always refreshes the cache after a successful backend write.
//! - `retrieve` is cache-first: a cached value is returned without backend
//!   I/O, so out-of-band backend changes stay invisible until the key is
//!   deleted or `clear_context` runs.
//! - History reads and trace writes never touch the cache.
//! - `clear_context` resets cache and session only; durable data is untouched.
//! - One instance per run. There is no process-wide state instance, and no
//!   internal locking: share across threads behind a `Mutex`.

pub mod cache;

use crate::backend::StorageResult;
use crate::config::StorageConfig;
use crate::model::record::{Filter, Metadata, Record, StoredValue, RUN_ID_FIELD};
use crate::model::trace::{Event, HistoryQuery, ModelPricing, Trace, TraceDetails};
use crate::storage::manager::StorageManager;
use cache::StateCache;
use log::{debug, info};
use serde_json::Value;

/// Session-scoped fields reset by `clear_context`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub run_id: Option<String>,
    /// Unix epoch milliseconds when the current run started.
    pub started_at: Option<i64>,
}

pub struct UniversalState {
    manager: StorageManager,
    cache: StateCache,
    session: SessionContext,
}

impl UniversalState {
    pub fn new(manager: StorageManager) -> Self {
        Self {
            manager,
            cache: StateCache::new(),
            session: SessionContext::default(),
        }
    }

    /// Opens the built-in backends described by `config`.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        Ok(Self::new(StorageManager::open(config)?))
    }

    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn run_id(&self) -> Option<&str> {
        self.session.run_id.as_deref()
    }

    /// Starts a run; subsequent stores are stamped with `run_id`.
    pub fn start_run(&mut self, run_id: impl Into<String>) {
        let run_id = run_id.into();
        info!("event=run_start module=state status=ok run_id={}", run_id);
        self.session = SessionContext {
            run_id: Some(run_id),
            started_at: Some(chrono::Utc::now().timestamp_millis()),
        };
    }

    pub fn store(
        &mut self,
        entity_type: &str,
        key: &str,
        value: impl Into<StoredValue>,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        let value = value.into();
        let metadata = self.stamp_run(metadata);
        let stored_key = self
            .manager
            .store(entity_type, key, value.clone(), metadata)?;
        self.cache.put(entity_type, key, value);
        Ok(stored_key)
    }

    /// Cache-first read; a backend hit populates the cache.
    pub fn retrieve(&mut self, entity_type: &str, key: &str) -> StorageResult<Option<StoredValue>> {
        if let Some(value) = self.cache.get(entity_type, key) {
            debug!(
                "event=state_retrieve module=state status=ok source=cache entity_type={} key={}",
                entity_type, key
            );
            return Ok(Some(value.clone()));
        }

        let value = self.manager.retrieve(entity_type, key)?;
        if let Some(value) = &value {
            self.cache.put(entity_type, key, value.clone());
        }
        debug!(
            "event=state_retrieve module=state status=ok source=backend entity_type={} key={} found={}",
            entity_type,
            key,
            value.is_some()
        );
        Ok(value)
    }

    /// Cache-first read that never populates the cache.
    ///
    /// Used by projections, which must not mutate state.
    pub fn get(&self, entity_type: &str, key: &str) -> StorageResult<Option<StoredValue>> {
        match self.cache.get(entity_type, key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.manager.retrieve(entity_type, key),
        }
    }

    pub fn query(&self, entity_type: Option<&str>, filter: &Filter) -> StorageResult<Vec<Record>> {
        self.manager.query(entity_type, filter)
    }

    /// Evicts the cache entry, then deletes from the owning backend.
    pub fn delete(&mut self, entity_type: &str, key: &str) -> StorageResult<bool> {
        self.cache.evict(entity_type, key);
        self.manager.delete(entity_type, key)
    }

    pub fn list_keys(
        &self,
        entity_type: Option<&str>,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        self.manager.list_keys(entity_type, prefix)
    }

    /// Traces newest first.
    pub fn query_history(&self, query: &HistoryQuery) -> StorageResult<Vec<Trace>> {
        self.manager.history()?.query_history(query)
    }

    pub fn get_trace_details(&self, trace_id: &str) -> StorageResult<Option<TraceDetails>> {
        self.manager.history()?.get_trace_details(trace_id)
    }

    pub fn get_prompt_history(&self, name: &str, limit: u32) -> StorageResult<Vec<Event>> {
        self.manager.history()?.get_prompt_history(name, limit)
    }

    pub fn log_trace(&self, trace: &Trace) -> StorageResult<()> {
        self.manager.history()?.log_trace(trace)
    }

    /// Logs an event and returns it with costs filled in.
    pub fn log_event(&self, event: &Event) -> StorageResult<Event> {
        self.manager.history()?.log_event(event)
    }

    /// Deletes one event; its children are kept with `parent_id` cleared.
    pub fn delete_event(&self, event_id: &str) -> StorageResult<bool> {
        self.manager.history()?.delete_event(event_id)
    }

    pub fn upsert_model_pricing(&self, pricing: &ModelPricing) -> StorageResult<()> {
        self.manager.history()?.upsert_model_pricing(pricing)
    }

    /// Drops cached values and session fields. Durable storage is untouched.
    pub fn clear_context(&mut self) {
        let evicted = self.cache.len();
        self.cache.clear();
        self.session = SessionContext::default();
        info!(
            "event=context_clear module=state status=ok evicted={}",
            evicted
        );
    }

    pub fn is_cached(&self, entity_type: &str, key: &str) -> bool {
        self.cache.contains(entity_type, key)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn stamp_run(&self, metadata: Option<Metadata>) -> Option<Metadata> {
        let Some(run_id) = self.session.run_id.as_deref() else {
            return metadata;
        };
        let mut metadata = metadata.unwrap_or_default();
        metadata
            .entry(RUN_ID_FIELD)
            .or_insert_with(|| Value::String(run_id.to_string()));
        Some(metadata)
    }
}
