//! Domain model for stored nodes.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every node is identified by a stable `NodeId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod node;
