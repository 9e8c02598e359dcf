//! Entity-type routing across the registered backends.
//!
//! # Responsibility
//! - Map entity types to backend names (`RoutingTable`).
//! - Present several backends as one backend-shaped facade (`HybridRouter`).
//! - Give callers an entity-type-aware entry point (`StorageManager`).
//!
//! # Invariants
//! - Every route resolves to a registered backend; this is checked at
//!   construction, not per call.
//! - `store`/`query` go through the router; the manager's `retrieve`/`delete`
//!   use the routing table directly and only sweep for unmapped types.

pub mod manager;
pub mod router;
pub mod routing;
