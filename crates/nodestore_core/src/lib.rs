//! Core domain logic for the node store.
//! This crate is the single source of truth for node invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time_window;

pub use config::{AppConfig, ConfigError, LoggingConfig, TimezoneMode};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{NewNode, Node, NodeId, NodeUpdate, NodeValidationError};
pub use repo::device_store::{DeviceRange, DeviceRecord, DeviceStore, DeviceStoreError};
pub use repo::node_repo::{
    CreatedAtRange, NodeFilter, NodeRepository, Pagination, RepoError, RepoResult,
    SqliteNodeRepository,
};
pub use service::device_service::{DeviceQuery, DeviceService};
pub use service::node_service::{ListQuery, NodeService, Page, WindowListing, WindowQuery};
pub use service::{PageRequest, ServiceError, ServiceResult};
pub use time_window::{
    RelativeRange, ResolvedWindow, TimeWindow, TimeWindowResolver, WindowError,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
