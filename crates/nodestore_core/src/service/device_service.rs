//! Device passthrough over the secondary store.
//!
//! # Responsibility
//! - Translate optional date bounds into a store range query.
//! - Apply the post-hoc device-id filter on the returned records.
//!
//! # Invariants
//! - Results are unpaginated and keep the store's `timestamp DESC` order.
//! - An empty `device_ids` set disables the id filter.

use crate::repo::device_store::{DeviceRange, DeviceRecord, DeviceStore};
use crate::service::ServiceResult;
use crate::time_window::TimeWindowResolver;
use chrono::{DateTime, Local, TimeZone, Utc};
use log::{error, info};

/// Device query input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceQuery {
    pub device_ids: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

pub struct DeviceService<S: DeviceStore, Tz: TimeZone = Local> {
    store: S,
    resolver: TimeWindowResolver<Tz>,
}

impl<S: DeviceStore> DeviceService<S, Local> {
    pub fn new(store: S) -> Self {
        Self::with_resolver(store, TimeWindowResolver::local())
    }
}

impl<S: DeviceStore, Tz: TimeZone> DeviceService<S, Tz> {
    pub fn with_resolver(store: S, resolver: TimeWindowResolver<Tz>) -> Self {
        Self { store, resolver }
    }

    /// Fetches device records inside the optional bounds.
    pub fn device_data(&self, query: &DeviceQuery) -> ServiceResult<Vec<DeviceRecord>> {
        let range = DeviceRange {
            gte: self.parse_bound(query.start.as_deref())?,
            lte: self.parse_bound(query.end.as_deref())?,
        };

        let mut records = match self.store.query_devices(&range) {
            Ok(records) => records,
            Err(err) => {
                error!("event=device_data module=service status=error error_code=device_store_failed error={err}");
                return Err(err.into());
            }
        };

        if !query.device_ids.is_empty() {
            records.retain(|record| record.mentions_any(&query.device_ids));
        }

        info!(
            "event=device_data module=service status=ok count={}",
            records.len()
        );
        Ok(records)
    }

    fn parse_bound(&self, raw: Option<&str>) -> ServiceResult<Option<DateTime<Utc>>> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Ok(Some(self.resolver.parse_instant(value)?)),
            None => Ok(None),
        }
    }
}
