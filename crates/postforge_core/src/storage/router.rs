//! Hybrid router: one backend-shaped facade over several named backends.
//!
//! # Invariants
//! - `store` resolves by metadata `entity_type`, then key prefix, then the
//!   first registered backend. Never random.
//! - `retrieve`/`delete` resolve by key prefix only; unmatched keys are swept
//!   across backends in registration order, first hit wins.
//! - A fan-out `query` drops any backend that fails instead of failing the
//!   whole call.

use super::routing::RoutingTable;
use crate::backend::{StorageBackend, StorageError, StorageResult};
use crate::model::record::{Filter, Metadata, Record, StoredValue, ENTITY_TYPE_FIELD};
use log::{debug, warn};
use serde_json::Value;

struct NamedBackend {
    name: String,
    backend: Box<dyn StorageBackend>,
}

/// Router composing registered backends with a routing table.
pub struct HybridRouter {
    backends: Vec<NamedBackend>,
    routing: RoutingTable,
}

impl HybridRouter {
    pub fn new(routing: RoutingTable) -> Self {
        Self {
            backends: Vec::new(),
            routing,
        }
    }

    /// Registers one backend under a unique name. Order is significant.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Box<dyn StorageBackend>,
    ) -> StorageResult<()> {
        let name = name.into().trim().to_string();
        if self.position(&name).is_some() {
            return Err(StorageError::DuplicateBackend(name));
        }
        self.backends.push(NamedBackend { name, backend });
        Ok(())
    }

    /// Checks that every route names a registered backend.
    pub fn validate_routes(&self) -> StorageResult<()> {
        for (_, backend) in self.routing.iter() {
            if self.position(backend).is_none() {
                return Err(StorageError::UnknownBackend(backend.to_string()));
            }
        }
        Ok(())
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn backend(&self, name: &str) -> Option<&dyn StorageBackend> {
        self.position(name)
            .map(|index| self.backends[index].backend.as_ref())
    }

    pub fn backend_mut(&mut self, name: &str) -> Option<&mut dyn StorageBackend> {
        let index = self.position(name)?;
        Some(self.backends[index].backend.as_mut())
    }

    /// Tries every backend in registration order; first present value wins.
    pub fn sweep_retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        for entry in &self.backends {
            if let Some(value) = entry.backend.retrieve(key)? {
                debug!(
                    "event=route_sweep module=storage status=ok op=retrieve backend={} key={}",
                    entry.name, key
                );
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Deletes from the first backend that holds `key`.
    pub fn sweep_delete(&mut self, key: &str) -> StorageResult<bool> {
        for entry in &mut self.backends {
            if entry.backend.delete(key)? {
                debug!(
                    "event=route_sweep module=storage status=ok op=delete backend={} key={}",
                    entry.name, key
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.backends.iter().position(|entry| entry.name == name)
    }

    fn resolve_entity_type(&self, entity_type: &str) -> Option<usize> {
        self.routing
            .resolve(entity_type)
            .and_then(|backend| self.position(backend))
    }

    fn resolve_key(&self, key: &str) -> Option<usize> {
        self.routing
            .resolve_key_prefix(key)
            .and_then(|(_, backend)| self.position(backend))
    }

    fn resolve_store(&self, key: &str, metadata: Option<&Metadata>) -> StorageResult<usize> {
        let by_type = metadata
            .and_then(|metadata| metadata.get(ENTITY_TYPE_FIELD))
            .and_then(Value::as_str)
            .and_then(|entity_type| self.resolve_entity_type(entity_type));
        if let Some(index) = by_type.or_else(|| self.resolve_key(key)) {
            return Ok(index);
        }
        if self.backends.is_empty() {
            return Err(StorageError::UnknownBackend("<none registered>".to_string()));
        }
        debug!(
            "event=route_resolve module=storage status=fallback op=store backend={} key={}",
            self.backends[0].name, key
        );
        Ok(0)
    }
}

impl StorageBackend for HybridRouter {
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        let index = self.resolve_store(key, metadata.as_ref())?;
        self.backends[index].backend.store(key, value, metadata)
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        match self.resolve_key(key) {
            Some(index) => self.backends[index].backend.retrieve(key),
            None => self.sweep_retrieve(key),
        }
    }

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>> {
        let owner = filter
            .get(ENTITY_TYPE_FIELD)
            .and_then(Value::as_str)
            .and_then(|entity_type| self.resolve_entity_type(entity_type));
        if let Some(index) = owner {
            return self.backends[index].backend.query(filter);
        }

        let mut merged = Vec::new();
        for entry in &self.backends {
            match entry.backend.query(filter) {
                Ok(records) => merged.extend(records),
                Err(err) => {
                    warn!(
                        "event=query_fanout module=storage status=skip backend={} error_code=backend_query_failed error={}",
                        entry.name, err
                    );
                }
            }
        }
        Ok(merged)
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        match self.resolve_key(key) {
            Some(index) => self.backends[index].backend.delete(key),
            None => self.sweep_delete(key),
        }
    }

    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in &self.backends {
            match entry.backend.list_keys(prefix) {
                Ok(found) => keys.extend(found),
                Err(err) => {
                    warn!(
                        "event=list_keys_fanout module=storage status=skip backend={} error_code=backend_list_failed error={}",
                        entry.name, err
                    );
                }
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
