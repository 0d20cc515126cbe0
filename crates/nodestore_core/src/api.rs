//! Request/response shaping for the node endpoints.
//!
//! # Responsibility
//! - Map wire DTOs onto service calls.
//! - Produce the JSON envelopes and status codes existing clients expect.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes a `{ message }` body.
//! - Status is 400 for caller input, 404 for missing nodes, 500 otherwise.
//! - Relative-window responses never carry page metadata.

use crate::model::node::Node;
use crate::repo::device_store::DeviceStore;
use crate::repo::node_repo::NodeRepository;
use crate::service::device_service::{DeviceQuery, DeviceService};
use crate::service::node_service::{ListQuery, NodeService, WindowListing, WindowQuery};
use crate::service::{PageRequest, ServiceError};
use crate::time_window::{TimeWindow, WindowError};
use chrono::TimeZone;
use log::error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

pub const MSG_INVALID_ID: &str = "Invalid node ID";
pub const MSG_NOT_FOUND: &str = "Node not found";
pub const MSG_SAVED: &str = "Node saved successfully";
pub const MSG_UPDATED: &str = "Node updated successfully";
pub const MSG_DELETED: &str = "Node marked as deleted successfully";
pub const MSG_EXPLICIT_REQUIRED: &str =
    "start, end, and nodeValue are required fields in the format dd/mm/yyyy hh:mm:ss";
pub const MSG_RELATIVE_REQUIRED: &str = "timeRange and nodeValue are required fields";
pub const MSG_NODE_VALUE_REQUIRED: &str = "nodeValue is required";
pub const MSG_INVALID_DATE: &str = "Invalid date format. Please use dd/mm/yyyy hh:mm:ss";
pub const MSG_INVALID_TIME_RANGE: &str = "Invalid timeRange value";
pub const MSG_INVALID_PAGINATION: &str = "page and limit must be positive integers";
pub const MSG_DEVICE_FAILURE: &str = "Failed to fetch data";

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Value::Object(
                [("message".to_string(), Value::String(message.into()))]
                    .into_iter()
                    .collect(),
            ),
        }
    }

    fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status, body },
            Err(err) => {
                error!("event=api_encode module=api status=error error={err}");
                Self::message(
                    STATUS_INTERNAL_ERROR,
                    format!("An error occurred: {err}"),
                )
            }
        }
    }
}

/// `page` / `limit` query parameters, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Query parameters of the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    #[serde(flatten)]
    pub page: PageParams,
    #[serde(rename = "nodeValue")]
    pub node_value: Option<String>,
}

/// Body carrying only a node identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdBody {
    #[serde(rename = "_id")]
    pub id: Option<String>,
}

/// Create/update body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeBody {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(rename = "nodeValue")]
    pub node_value: Option<String>,
    #[serde(rename = "activityData")]
    pub activity_data: Option<Value>,
}

/// Explicit-window filter body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimestampFilterBody {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(rename = "nodeValue")]
    pub node_value: Option<String>,
}

/// Relative-window filter body. `endDate`, when present, anchors the window;
/// `startDate` is accepted for compatibility and otherwise unused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimeRangeBody {
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
    #[serde(rename = "nodeValue")]
    pub node_value: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

/// Device passthrough body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceBody {
    #[serde(rename = "deviceIds")]
    pub device_ids: Option<Vec<String>>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Serialize)]
struct PagedEnvelope<'a> {
    data: &'a [Node],
    #[serde(rename = "currentPage")]
    current_page: u64,
    #[serde(rename = "totalPages")]
    total_pages: u64,
}

#[derive(Serialize)]
struct DataEnvelope<'a, T> {
    data: &'a [T],
}

#[derive(Serialize)]
struct NodeEnvelope<'a> {
    message: &'static str,
    node: &'a Node,
}

/// Decodes a JSON request payload into a DTO.
///
/// # Errors
/// Returns a ready 400 response when the payload does not match the DTO.
pub fn parse_body<T: DeserializeOwned>(raw: &str) -> Result<T, ApiResponse> {
    let trimmed = raw.trim();
    let source = if trimmed.is_empty() { "{}" } else { trimmed };
    serde_json::from_str(source).map_err(|err| {
        ApiResponse::message(STATUS_BAD_REQUEST, format!("Malformed request body: {err}"))
    })
}

/// Lists live nodes with pagination.
pub fn index<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    params: &ListParams,
) -> ApiResponse {
    let page = match page_request(&params.page) {
        Ok(page) => page,
        Err(err) => return error_response(&err, MSG_INVALID_PAGINATION),
    };
    let query = ListQuery {
        page,
        node_value: params.node_value.clone(),
    };

    match service.list(&query) {
        Ok(page) => ApiResponse::json(
            STATUS_OK,
            &PagedEnvelope {
                data: &page.items,
                current_page: page.current_page,
                total_pages: page.total_pages,
            },
        ),
        Err(err) => error_response(&err, MSG_INVALID_PAGINATION),
    }
}

/// Returns one live node as the bare body.
pub fn show<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &IdBody,
) -> ApiResponse {
    match service.get(body.id.as_deref().unwrap_or_default()) {
        Ok(node) => ApiResponse::json(STATUS_OK, &node),
        Err(err) => error_response(&err, MSG_INVALID_ID),
    }
}

/// Creates a node.
pub fn store<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &NodeBody,
) -> ApiResponse {
    let activity_data = body.activity_data.clone().unwrap_or(Value::Null);
    match service.create(body.node_value.as_deref().unwrap_or_default(), activity_data) {
        Ok(node) => ApiResponse::json(
            STATUS_CREATED,
            &NodeEnvelope {
                message: MSG_SAVED,
                node: &node,
            },
        ),
        Err(err) => error_response(&err, MSG_NODE_VALUE_REQUIRED),
    }
}

/// Replaces `nodeValue` and `activityData` of a node.
pub fn update<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &NodeBody,
) -> ApiResponse {
    let activity_data = body.activity_data.clone().unwrap_or(Value::Null);
    match service.update(
        body.id.as_deref().unwrap_or_default(),
        body.node_value.as_deref().unwrap_or_default(),
        activity_data,
    ) {
        Ok(node) => ApiResponse::json(
            STATUS_OK,
            &NodeEnvelope {
                message: MSG_UPDATED,
                node: &node,
            },
        ),
        Err(err) => error_response(&err, MSG_NODE_VALUE_REQUIRED),
    }
}

/// Soft-deletes a node.
pub fn destroy<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &IdBody,
) -> ApiResponse {
    match service.soft_delete(body.id.as_deref().unwrap_or_default()) {
        Ok(_) => ApiResponse::message(STATUS_OK, MSG_DELETED),
        Err(err) => error_response(&err, MSG_INVALID_ID),
    }
}

/// Filters by `nodeValue` inside an explicit `[startDate, endDate]` window.
pub fn filter_by_timestamp<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &TimestampFilterBody,
    params: &PageParams,
) -> ApiResponse {
    let (Some(start), Some(end), Some(node_value)) =
        (&body.start_date, &body.end_date, &body.node_value)
    else {
        return ApiResponse::message(STATUS_BAD_REQUEST, MSG_EXPLICIT_REQUIRED);
    };
    let page = match page_request(params) {
        Ok(page) => page,
        Err(err) => return error_response(&err, MSG_EXPLICIT_REQUIRED),
    };

    let query = WindowQuery {
        node_value: node_value.clone(),
        window: TimeWindow::Explicit {
            start: start.clone(),
            end: end.clone(),
        },
        page,
    };
    window_response(service, &query, MSG_EXPLICIT_REQUIRED)
}

/// Filters by `nodeValue` inside a relative `timeRange` window.
pub fn filter_by_time_range<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    body: &TimeRangeBody,
) -> ApiResponse {
    let (Some(time_range), Some(node_value)) = (&body.time_range, &body.node_value) else {
        return ApiResponse::message(STATUS_BAD_REQUEST, MSG_RELATIVE_REQUIRED);
    };

    let query = WindowQuery {
        node_value: node_value.clone(),
        window: TimeWindow::Relative {
            time_range: time_range.clone(),
            anchor: body
                .end_date
                .clone()
                .filter(|value| !value.trim().is_empty()),
        },
        page: PageRequest::default(),
    };
    window_response(service, &query, MSG_RELATIVE_REQUIRED)
}

/// Reads device records from the secondary store.
pub fn device_data<S: DeviceStore, Tz: TimeZone>(
    service: &DeviceService<S, Tz>,
    body: &DeviceBody,
) -> ApiResponse {
    let query = DeviceQuery {
        device_ids: body.device_ids.clone().unwrap_or_default(),
        start: body.start_date.clone(),
        end: body.end_date.clone(),
    };

    match service.device_data(&query) {
        Ok(records) => ApiResponse::json(
            STATUS_OK,
            &DataEnvelope {
                data: records.as_slice(),
            },
        ),
        Err(err) => error_response(&err, MSG_INVALID_DATE),
    }
}

fn window_response<R: NodeRepository, Tz: TimeZone>(
    service: &NodeService<R, Tz>,
    query: &WindowQuery,
    missing_message: &str,
) -> ApiResponse {
    match service.filter_by_window(query) {
        Ok(WindowListing::Paged(page)) => ApiResponse::json(
            STATUS_OK,
            &PagedEnvelope {
                data: &page.items,
                current_page: page.current_page,
                total_pages: page.total_pages,
            },
        ),
        Ok(WindowListing::Unpaged(items)) => ApiResponse::json(
            STATUS_OK,
            &DataEnvelope {
                data: items.as_slice(),
            },
        ),
        Err(err) => error_response(&err, missing_message),
    }
}

fn page_request(params: &PageParams) -> Result<PageRequest, ServiceError> {
    PageRequest::parse(params.page.as_deref(), params.limit.as_deref())
}

/// Maps a service failure onto status and message.
///
/// `input_message` is used for missing-field and node-validation failures,
/// whose wording differs per endpoint.
fn error_response(err: &ServiceError, input_message: &str) -> ApiResponse {
    match err {
        ServiceError::InvalidId(_) => ApiResponse::message(STATUS_BAD_REQUEST, MSG_INVALID_ID),
        ServiceError::MissingField(_) | ServiceError::Validation(_) => {
            ApiResponse::message(STATUS_BAD_REQUEST, input_message)
        }
        ServiceError::InvalidPagination(_) => {
            ApiResponse::message(STATUS_BAD_REQUEST, MSG_INVALID_PAGINATION)
        }
        ServiceError::Window(WindowError::InvalidTimeRange(_)) => {
            ApiResponse::message(STATUS_BAD_REQUEST, MSG_INVALID_TIME_RANGE)
        }
        ServiceError::Window(_) => ApiResponse::message(STATUS_BAD_REQUEST, MSG_INVALID_DATE),
        ServiceError::NotFound(_) => ApiResponse::message(STATUS_NOT_FOUND, MSG_NOT_FOUND),
        ServiceError::Store(store_err) => ApiResponse::message(
            STATUS_INTERNAL_ERROR,
            format!("An error occurred: {store_err}"),
        ),
        ServiceError::Device(_) => {
            ApiResponse::message(STATUS_INTERNAL_ERROR, MSG_DEVICE_FAILURE)
        }
    }
}
