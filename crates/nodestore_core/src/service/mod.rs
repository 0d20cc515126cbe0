//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Classify failures into validation, not-found and store categories.
//!
//! # Invariants
//! - Service layer remains storage-agnostic.

use crate::model::node::{NodeId, NodeValidationError};
use crate::repo::device_store::DeviceStoreError;
use crate::repo::node_repo::RepoError;
use crate::time_window::WindowError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod device_service;
pub mod node_service;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for node and device use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Identifier failed the store's well-formedness check.
    InvalidId(String),
    /// A required input field is absent or blank.
    MissingField(&'static str),
    /// `page`/`limit` is not a positive integer.
    InvalidPagination(String),
    Window(WindowError),
    Validation(NodeValidationError),
    /// Store lookup confirmed the node does not exist.
    NotFound(NodeId),
    Store(RepoError),
    Device(DeviceStoreError),
}

impl ServiceError {
    /// Returns whether the failure was caused by caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidId(_)
                | Self::MissingField(_)
                | Self::InvalidPagination(_)
                | Self::Window(_)
                | Self::Validation(_)
        )
    }

    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "invalid_id",
            Self::MissingField(_) => "missing_field",
            Self::InvalidPagination(_) => "invalid_pagination",
            Self::Window(WindowError::InvalidTimeRange(_)) => "invalid_time_range",
            Self::Window(_) => "invalid_date_format",
            Self::Validation(_) => "invalid_node",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store_failed",
            Self::Device(_) => "device_store_failed",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(raw) => write!(f, "invalid node id: `{raw}`"),
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidPagination(details) => write!(f, "invalid pagination: {details}"),
            Self::Window(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "node not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Device(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Window(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<WindowError> for ServiceError {
    fn from(value: WindowError) -> Self {
        Self::Window(value)
    }
}

impl From<NodeValidationError> for ServiceError {
    fn from(value: NodeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DeviceStoreError> for ServiceError {
    fn from(value: DeviceStoreError) -> Self {
        Self::Device(value)
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    /// Builds a page request; both values must be at least 1.
    pub fn new(page: u64, limit: u64) -> ServiceResult<Self> {
        if page == 0 {
            return Err(ServiceError::InvalidPagination(
                "page must be >= 1".to_string(),
            ));
        }
        if limit == 0 {
            return Err(ServiceError::InvalidPagination(
                "limit must be >= 1".to_string(),
            ));
        }
        Ok(Self { page, limit })
    }

    /// Parses raw query-string values, falling back to defaults when absent.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> ServiceResult<Self> {
        Self::new(
            parse_positive("page", page, DEFAULT_PAGE)?,
            parse_positive("limit", limit, DEFAULT_PAGE_LIMIT)?,
        )
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

fn parse_positive(field: &str, raw: Option<&str>, default: u64) -> ServiceResult<u64> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(default);
    };
    raw.parse::<u64>().map_err(|_| {
        ServiceError::InvalidPagination(format!(
            "{field} must be a positive integer, got `{raw}`"
        ))
    })
}
