//! Entity-type-aware storage entry point.
//!
//! # Responsibility
//! - Own the concrete backends (through the router) and the merged routing table.
//! - Stamp `entity_type` on writes and resolve reads in O(1) by entity type.
//!
//! # Invariants
//! - `store`/`query` always go through the router.
//! - `retrieve`/`delete` of a mapped entity type touch only the mapped
//!   backend; only unmapped types fall back to the router's sweep.
//! - Call-scoped backend overrides never mutate the routing table.

use super::router::HybridRouter;
use super::routing::RoutingTable;
use crate::backend::{
    DocumentBackend, InProcessBackend, RelationalBackend, StorageBackend, StorageError,
    StorageResult, DOCUMENT_BACKEND, IN_PROCESS_BACKEND, RELATIONAL_BACKEND,
};
use crate::config::StorageConfig;
use crate::model::record::{Filter, Metadata, Record, StoredValue, ENTITY_TYPE_FIELD};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;

pub struct StorageManager {
    router: HybridRouter,
    history: Option<RelationalBackend>,
}

impl StorageManager {
    /// Opens the three built-in backends described by `config`.
    ///
    /// Registration order is document, relational, in-process; the document
    /// backend is therefore the router's last-resort store target.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        let document = DocumentBackend::open(&config.document_root)?;
        let relational = RelationalBackend::open(&config.database_path)?;
        let history = relational.clone();

        let manager = Self::with_backends(
            vec![
                (DOCUMENT_BACKEND.to_string(), Box::new(document) as Box<dyn StorageBackend>),
                (RELATIONAL_BACKEND.to_string(), Box::new(relational)),
                (IN_PROCESS_BACKEND.to_string(), Box::new(InProcessBackend::new())),
            ],
            Some(history),
            &config.routing_overrides,
        )?;
        info!(
            "event=storage_open module=storage status=ok document_root={} database={} routes={}",
            config.document_root.display(),
            config.database_path.display(),
            manager.routing().len()
        );
        Ok(manager)
    }

    /// Builds a manager over caller-supplied backends.
    ///
    /// `overrides` merge on top of the default routing table; every resulting
    /// route must name one of `backends`.
    pub fn with_backends(
        backends: Vec<(String, Box<dyn StorageBackend>)>,
        history: Option<RelationalBackend>,
        overrides: &BTreeMap<String, String>,
    ) -> StorageResult<Self> {
        let mut routing = RoutingTable::defaults();
        routing.merge(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut router = HybridRouter::new(routing);
        for (name, backend) in backends {
            router.register(name, backend)?;
        }
        router.validate_routes()?;

        Ok(Self { router, history })
    }

    pub fn routing(&self) -> &RoutingTable {
        self.router.routing()
    }

    pub fn router(&self) -> &HybridRouter {
        &self.router
    }

    /// Relational backend used for trace/event history, when configured.
    pub fn history(&self) -> StorageResult<&RelationalBackend> {
        self.history
            .as_ref()
            .ok_or_else(|| StorageError::UnknownBackend(RELATIONAL_BACKEND.to_string()))
    }

    pub fn store(
        &mut self,
        entity_type: &str,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        let metadata = stamp_entity_type(entity_type, metadata);
        self.router.store(key, value, Some(metadata))
    }

    pub fn retrieve(&self, entity_type: &str, key: &str) -> StorageResult<Option<StoredValue>> {
        match self.mapped_backend(entity_type)? {
            Some(name) => self.backend(name)?.retrieve(key),
            None => self.router.sweep_retrieve(key),
        }
    }

    /// Queries through the router, scoping to `entity_type` when given.
    pub fn query(&self, entity_type: Option<&str>, filter: &Filter) -> StorageResult<Vec<Record>> {
        let mut filter = filter.clone();
        if let Some(entity_type) = entity_type {
            filter.insert(
                ENTITY_TYPE_FIELD.to_string(),
                Value::String(entity_type.to_string()),
            );
        }
        self.router.query(&filter)
    }

    pub fn delete(&mut self, entity_type: &str, key: &str) -> StorageResult<bool> {
        match self.mapped_backend(entity_type)? {
            Some(name) => {
                let name = name.to_string();
                self.backend_mut(&name)?.delete(key)
            }
            None => self.router.sweep_delete(key),
        }
    }

    /// Lists keys of the backend owning `entity_type`, or of every backend.
    pub fn list_keys(
        &self,
        entity_type: Option<&str>,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        let mapped = match entity_type {
            Some(entity_type) => self.mapped_backend(entity_type)?,
            None => None,
        };
        match mapped {
            Some(name) => self.backend(name)?.list_keys(prefix),
            None => self.router.list_keys(prefix),
        }
    }

    /// Stores into `backend` for this call only, bypassing the routing table.
    pub fn store_on_backend(
        &mut self,
        backend: &str,
        entity_type: &str,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        let metadata = stamp_entity_type(entity_type, metadata);
        self.backend_mut(backend)?.store(key, value, Some(metadata))
    }

    /// Reads from `backend` for this call only, bypassing the routing table.
    pub fn retrieve_from_backend(
        &self,
        backend: &str,
        key: &str,
    ) -> StorageResult<Option<StoredValue>> {
        self.backend(backend)?.retrieve(key)
    }

    fn mapped_backend(&self, entity_type: &str) -> StorageResult<Option<&str>> {
        Ok(self.router.routing().resolve(entity_type))
    }

    fn backend(&self, name: &str) -> StorageResult<&dyn StorageBackend> {
        self.router
            .backend(name)
            .ok_or_else(|| StorageError::UnknownBackend(name.to_string()))
    }

    fn backend_mut(&mut self, name: &str) -> StorageResult<&mut dyn StorageBackend> {
        self.router
            .backend_mut(name)
            .ok_or_else(|| StorageError::UnknownBackend(name.to_string()))
    }
}

fn stamp_entity_type(entity_type: &str, metadata: Option<Metadata>) -> Metadata {
    let mut metadata = metadata.unwrap_or_default();
    metadata.insert(
        ENTITY_TYPE_FIELD.to_string(),
        Value::String(entity_type.to_string()),
    );
    metadata
}
