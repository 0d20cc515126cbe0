//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store capabilities the service layer depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic outcomes (`None`, `NotFound`) in
//!   addition to DB transport errors.

pub mod device_store;
pub mod node_repo;
