//! Node query dispatcher.
//!
//! # Responsibility
//! - Build store filters (value match, liveness, time window) and paging.
//! - Execute list/get/filter/create/update/soft-delete use-cases.
//!
//! # Invariants
//! - Validation failures are returned before any repository call.
//! - Every listing is sorted by `createdAt` descending (store contract).
//! - `list` counts all live nodes for `total_pages`, ignoring the value
//!   filter applied to the page itself. Explicit-window filters count under
//!   the full filter. Both behaviors are pinned by tests; do not unify.
//! - Relative-window filters are never paginated.

use crate::model::node::{NewNode, Node, NodeId, NodeUpdate};
use crate::repo::node_repo::{NodeFilter, NodeRepository, Pagination};
use crate::service::{PageRequest, ServiceError, ServiceResult};
use crate::time_window::{TimeWindow, TimeWindowResolver};
use chrono::{Local, TimeZone};
use log::{debug, error, info, warn};
use serde_json::Value;

/// One page of results plus page metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u64,
    pub total_pages: u64,
}

/// Listing input. `node_value` filters the page contents only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: PageRequest,
    pub node_value: Option<String>,
}

/// Time-filtered listing input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowQuery {
    pub node_value: String,
    pub window: TimeWindow,
    /// Applied to explicit windows only.
    pub page: PageRequest,
}

/// Result shape of a time-filtered listing.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowListing {
    Paged(Page<Node>),
    Unpaged(Vec<Node>),
}

impl WindowListing {
    pub fn items(&self) -> &[Node] {
        match self {
            Self::Paged(page) => &page.items,
            Self::Unpaged(items) => items,
        }
    }
}

/// Dispatcher over a node repository.
pub struct NodeService<R: NodeRepository, Tz: TimeZone = Local> {
    repo: R,
    resolver: TimeWindowResolver<Tz>,
}

impl<R: NodeRepository> NodeService<R, Local> {
    /// Creates a service resolving wall-clock input in the host zone.
    pub fn new(repo: R) -> Self {
        Self::with_resolver(repo, TimeWindowResolver::local())
    }
}

impl<R: NodeRepository, Tz: TimeZone> NodeService<R, Tz> {
    pub fn with_resolver(repo: R, resolver: TimeWindowResolver<Tz>) -> Self {
        Self { repo, resolver }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Lists live nodes, newest first.
    ///
    /// `total_pages` is computed from every live node, regardless of
    /// `query.node_value`.
    pub fn list(&self, query: &ListQuery) -> ServiceResult<Page<Node>> {
        debug!(
            "event=node_list module=service status=start page={} limit={}",
            query.page.page, query.page.limit
        );

        let mut filter = NodeFilter::live();
        if let Some(node_value) = &query.node_value {
            filter = filter.with_node_value(node_value.as_str());
        }

        let result = self.paged(&filter, &NodeFilter::live(), query.page);
        log_outcome("node_list", &result, |page| page.items.len());
        result
    }

    /// Gets one live node by raw identifier.
    pub fn get(&self, raw_id: &str) -> ServiceResult<Node> {
        debug!("event=node_get module=service status=start");

        let result = self.parse_id(raw_id).and_then(|id| {
            self.repo
                .find_one(&NodeFilter::by_id(id))?
                .ok_or(ServiceError::NotFound(id))
        });
        log_outcome("node_get", &result, |_| 1);
        result
    }

    /// Lists live nodes matching `node_value` inside a time window.
    ///
    /// Explicit windows are paginated and counted under the full filter.
    /// Relative windows return every match and carry no page metadata.
    pub fn filter_by_window(&self, query: &WindowQuery) -> ServiceResult<WindowListing> {
        debug!(
            "event=node_filter module=service status=start mode={}",
            window_mode(&query.window)
        );

        let result = self.dispatch_window(query);
        log_outcome("node_filter", &result, |listing| listing.items().len());
        result
    }

    /// Creates a node; the store assigns `id` and `createdAt`.
    pub fn create(&self, node_value: &str, activity_data: Value) -> ServiceResult<Node> {
        debug!("event=node_create module=service status=start");

        let result = require("nodeValue", node_value).and_then(|()| {
            let new_node = NewNode::new(node_value, activity_data);
            new_node.validate()?;
            Ok(self.repo.insert(&new_node)?)
        });
        log_outcome("node_create", &result, |_| 1);
        result
    }

    /// Replaces `nodeValue` and `activityData` of a live or deleted node.
    pub fn update(
        &self,
        raw_id: &str,
        node_value: &str,
        activity_data: Value,
    ) -> ServiceResult<Node> {
        debug!("event=node_update module=service status=start");

        let result = self.parse_id(raw_id).and_then(|id| {
            require("nodeValue", node_value)?;
            let update = NodeUpdate::Content {
                node_value: node_value.to_string(),
                activity_data,
            };
            update.validate()?;
            self.repo
                .update_by_id(id, &update)?
                .ok_or(ServiceError::NotFound(id))
        });
        log_outcome("node_update", &result, |_| 1);
        result
    }

    /// Sets the tombstone flag. Repeating it on a deleted node succeeds.
    pub fn soft_delete(&self, raw_id: &str) -> ServiceResult<NodeId> {
        debug!("event=node_delete module=service status=start");

        let result = self.parse_id(raw_id).and_then(|id| {
            self.repo
                .update_by_id(id, &NodeUpdate::SoftDelete)?
                .map(|node| node.id)
                .ok_or(ServiceError::NotFound(id))
        });
        log_outcome("node_delete", &result, |_| 1);
        result
    }

    fn dispatch_window(&self, query: &WindowQuery) -> ServiceResult<WindowListing> {
        require("nodeValue", &query.node_value)?;
        match &query.window {
            TimeWindow::Explicit { start, end } => {
                require("start", start)?;
                require("end", end)?;
            }
            TimeWindow::Relative { time_range, .. } => {
                require("timeRange", time_range)?;
            }
        }

        let resolved = self.resolver.resolve(&query.window)?;
        let filter = NodeFilter::live()
            .with_node_value(query.node_value.as_str())
            .with_created_at(resolved.to_range());

        match query.window {
            TimeWindow::Explicit { .. } => {
                Ok(WindowListing::Paged(self.paged(&filter, &filter, query.page)?))
            }
            TimeWindow::Relative { .. } => Ok(WindowListing::Unpaged(self.repo.find(&filter, None)?)),
        }
    }

    fn paged(
        &self,
        filter: &NodeFilter,
        count_filter: &NodeFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Node>> {
        let items = self.repo.find(
            filter,
            Some(Pagination {
                skip: page.skip(),
                limit: page.limit,
            }),
        )?;
        let total = self.repo.count(count_filter)?;

        Ok(Page {
            items,
            current_page: page.page,
            total_pages: page.total_pages(total),
        })
    }

    fn parse_id(&self, raw_id: &str) -> ServiceResult<NodeId> {
        self.repo
            .parse_id(raw_id)
            .ok_or_else(|| ServiceError::InvalidId(raw_id.to_string()))
    }
}

/// Rejects absent or whitespace-only input. Accepted values are used verbatim.
fn require(field: &'static str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::MissingField(field));
    }
    Ok(())
}

fn window_mode(window: &TimeWindow) -> &'static str {
    match window {
        TimeWindow::Explicit { .. } => "explicit",
        TimeWindow::Relative { .. } => "relative",
    }
}

fn log_outcome<T>(event: &str, result: &ServiceResult<T>, count: impl Fn(&T) -> usize) {
    match result {
        Ok(value) => info!(
            "event={event} module=service status=ok count={}",
            count(value)
        ),
        Err(ServiceError::Store(err)) => {
            error!("event={event} module=service status=error error_code=store_failed error={err}")
        }
        Err(err) => warn!(
            "event={event} module=service status=rejected error_code={} error={err}",
            err.code()
        ),
    }
}
