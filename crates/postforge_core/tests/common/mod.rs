//! Shared test doubles for integration tests.
#![allow(dead_code)]

use postforge_core::{
    Filter, InProcessBackend, Metadata, Record, StorageBackend, StorageError, StorageManager,
    StorageResult, StoredValue,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-operation call counters shared between a spy and the test body.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub store: AtomicUsize,
    pub retrieve: AtomicUsize,
    pub query: AtomicUsize,
    pub delete: AtomicUsize,
}

impl CallCounts {
    pub fn retrieves(&self) -> usize {
        self.retrieve.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.query.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.store.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete.load(Ordering::SeqCst)
    }
}

/// In-process backend that counts every call.
pub struct SpyBackend {
    inner: InProcessBackend,
    counts: Arc<CallCounts>,
}

impl SpyBackend {
    pub fn new() -> (Self, Arc<CallCounts>) {
        let counts = Arc::new(CallCounts::default());
        (
            Self {
                inner: InProcessBackend::new(),
                counts: Arc::clone(&counts),
            },
            counts,
        )
    }
}

impl StorageBackend for SpyBackend {
    fn store(
        &mut self,
        key: &str,
        value: StoredValue,
        metadata: Option<Metadata>,
    ) -> StorageResult<String> {
        self.counts.store.fetch_add(1, Ordering::SeqCst);
        self.inner.store(key, value, metadata)
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        self.counts.retrieve.fetch_add(1, Ordering::SeqCst);
        self.inner.retrieve(key)
    }

    fn query(&self, filter: &Filter) -> StorageResult<Vec<Record>> {
        self.counts.query.fetch_add(1, Ordering::SeqCst);
        self.inner.query(filter)
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        self.counts.delete.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key)
    }

    fn list_keys(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        self.inner.list_keys(prefix)
    }
}

/// Backend whose reads and queries always fail.
pub struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
    fn store(&mut self, _: &str, _: StoredValue, _: Option<Metadata>) -> StorageResult<String> {
        Err(unavailable())
    }

    fn retrieve(&self, _: &str) -> StorageResult<Option<StoredValue>> {
        Err(unavailable())
    }

    fn query(&self, _: &Filter) -> StorageResult<Vec<Record>> {
        Err(unavailable())
    }

    fn delete(&mut self, _: &str) -> StorageResult<bool> {
        Err(unavailable())
    }

    fn list_keys(&self, _: Option<&str>) -> StorageResult<Vec<String>> {
        Err(unavailable())
    }
}

fn unavailable() -> StorageError {
    StorageError::Io {
        path: PathBuf::from("/unavailable"),
        source: std::io::Error::new(std::io::ErrorKind::Other, "backend offline"),
    }
}

/// Spies registered under the three built-in backend names.
pub struct SpiedManager {
    pub manager: StorageManager,
    pub document: Arc<CallCounts>,
    pub relational: Arc<CallCounts>,
    pub in_process: Arc<CallCounts>,
}

pub fn spied_manager() -> SpiedManager {
    let (document, document_counts) = SpyBackend::new();
    let (relational, relational_counts) = SpyBackend::new();
    let (in_process, in_process_counts) = SpyBackend::new();
    let backends: Vec<(String, Box<dyn StorageBackend>)> = vec![
        ("document".to_string(), Box::new(document)),
        ("relational".to_string(), Box::new(relational)),
        ("in_process".to_string(), Box::new(in_process)),
    ];
    let manager =
        StorageManager::with_backends(backends, None, &BTreeMap::new()).expect("spied manager");
    SpiedManager {
        manager,
        document: document_counts,
        relational: relational_counts,
        in_process: in_process_counts,
    }
}
