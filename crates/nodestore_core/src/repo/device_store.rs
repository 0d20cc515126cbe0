//! Secondary device-store contract.
//!
//! # Responsibility
//! - Describe the read capability the device passthrough needs from an
//!   external document store (`devices` collection).
//!
//! # Invariants
//! - Results are ordered by `timestamp` descending.
//! - Both bounds are inclusive and optional.
//! - No concrete client lives in core; callers inject one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Inclusive timestamp bounds for device queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceRange {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

impl DeviceRange {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.gte.map_or(true, |gte| timestamp >= gte)
            && self.lte.map_or(true, |lte| timestamp <= lte)
    }
}

/// One document from the `devices` collection.
///
/// Fields other than the ones named here pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub device_ids: Vec<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DeviceRecord {
    /// Returns whether any of `wanted` appears in this record's id list.
    pub fn mentions_any(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|id| self.device_ids.contains(id))
    }
}

/// Transport or backend failure reported by a device store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStoreError {
    message: String,
}

impl DeviceStoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DeviceStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "device store failure: {}", self.message)
    }
}

impl Error for DeviceStoreError {}

/// Read capability over the `devices` collection.
pub trait DeviceStore {
    fn query_devices(&self, range: &DeviceRange) -> Result<Vec<DeviceRecord>, DeviceStoreError>;
}
