//! Stored record and execution-trace models.
//!
//! # Responsibility
//! - Define the value shapes every backend accepts and returns.
//! - Define the trace/event rows owned by the relational logging schema.
//!
//! # Invariants
//! - A record key is its stable identity within one backend.
//! - Entity types are plain strings; routing decides what they mean.

pub mod record;
pub mod trace;
