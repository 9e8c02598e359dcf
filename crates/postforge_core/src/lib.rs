//! Persistence core for the post generation pipeline.
//! Routes records across document, relational and in-process backends and
//! exposes read-only projections over the stored state.

pub mod backend;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod projection;
pub mod state;
pub mod storage;

pub use backend::{
    DocumentBackend, InProcessBackend, RelationalBackend, StorageBackend, StorageError,
    StorageResult, DOCUMENT_BACKEND, IN_PROCESS_BACKEND, RELATIONAL_BACKEND,
};
pub use config::StorageConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{
    Filter, LiveObject, Metadata, Record, StoredValue, ENTITY_TYPE_FIELD, RUN_ID_FIELD,
};
pub use model::trace::{Event, EventCost, HistoryQuery, ModelPricing, Trace, TraceDetails};
pub use projection::{
    EpisodicProjection, HierarchicalProjection, ProjectionStrategy, SemanticProjection, View,
};
pub use state::{SessionContext, UniversalState};
pub use storage::manager::StorageManager;
pub use storage::router::HybridRouter;
pub use storage::routing::RoutingTable;

/// Minimal health-check API for wiring probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
