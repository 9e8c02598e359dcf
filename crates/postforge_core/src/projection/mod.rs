//! Read-only projections over `UniversalState`.
//!
//! # Responsibility
//! - Compute bounded views for consumers (prompt builders, reviewers).
//!
//! # Invariants
//! - `project` takes `&UniversalState` and never mutates it (no cache fills).
//! - Views are recomputed on every call and never persisted.

pub mod episodic;
pub mod hierarchical;
pub mod semantic;

pub use episodic::EpisodicProjection;
pub use hierarchical::HierarchicalProjection;
pub use semantic::SemanticProjection;

use crate::backend::StorageResult;
use crate::state::UniversalState;
use serde_json::{Map, Value};

/// Transient projection output.
pub type View = Map<String, Value>;

/// Common contract for every projection strategy.
pub trait ProjectionStrategy {
    /// Stable strategy name used in logs.
    fn name(&self) -> &'static str;

    fn project(&self, state: &UniversalState, query: Option<&str>) -> StorageResult<View>;
}
