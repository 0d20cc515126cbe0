use chrono::{TimeZone, Utc};
use nodestore_core::api::{
    self, parse_body, IdBody, ListParams, NodeBody, PageParams, TimeRangeBody,
    TimestampFilterBody,
};
use nodestore_core::db::open_db_in_memory;
use nodestore_core::{
    DeviceRange, DeviceRecord, DeviceService, DeviceStore, DeviceStoreError, NodeService,
    SqliteNodeRepository, TimeWindowResolver,
};
use rusqlite::{params, Connection};
use serde_json::{json, Map};

fn service(conn: &Connection) -> NodeService<SqliteNodeRepository<'_>, Utc> {
    NodeService::with_resolver(
        SqliteNodeRepository::try_new(conn).unwrap(),
        TimeWindowResolver::utc(),
    )
}

fn seed(conn: &Connection, node_value: &str, created_at: (u32, u32, u32)) -> String {
    let service = service(conn);
    let created = api::store(
        &service,
        &NodeBody {
            id: None,
            node_value: Some(node_value.to_string()),
            activity_data: Some(json!({"seeded": true})),
        },
    );
    assert_eq!(created.status, api::STATUS_CREATED);
    let id = created.body["node"]["_id"].as_str().unwrap().to_string();

    let (day, hour, minute) = created_at;
    conn.execute(
        "UPDATE nodes SET created_at = ?1 WHERE id = ?2;",
        params![
            Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0)
                .unwrap()
                .timestamp_millis(),
            id
        ],
    )
    .unwrap();
    id
}

fn message(response: &api::ApiResponse) -> &str {
    response.body["message"].as_str().unwrap()
}

#[test]
fn store_returns_created_envelope() {
    let conn = open_db_in_memory().unwrap();
    let body: NodeBody =
        parse_body(r#"{"nodeValue":"run","activityData":{"km":5}}"#).unwrap();

    let response = api::store(&service(&conn), &body);

    assert_eq!(response.status, 201);
    assert_eq!(message(&response), api::MSG_SAVED);
    let node = &response.body["node"];
    assert_eq!(node["nodeValue"], json!("run"));
    assert_eq!(node["activityData"], json!({"km": 5}));
    assert_eq!(node["isDeleted"], json!(false));
    assert!(node["createdAt"].is_string());
}

#[test]
fn store_without_node_value_is_bad_request() {
    let conn = open_db_in_memory().unwrap();

    let response = api::store(&service(&conn), &NodeBody::default());
    assert_eq!(response.status, 400);
    assert_eq!(message(&response), api::MSG_NODE_VALUE_REQUIRED);
}

#[test]
fn index_returns_paged_envelope() {
    let conn = open_db_in_memory().unwrap();
    for minute in 0..3 {
        seed(&conn, "run", (1, 10, minute));
    }
    seed(&conn, "swim", (1, 11, 0));

    let params: ListParams = parse_body(r#"{"page":"1","limit":"2","nodeValue":"run"}"#).unwrap();
    let response = api::index(&service(&conn), &params);

    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["currentPage"], json!(1));
    assert_eq!(response.body["totalPages"], json!(2));
}

#[test]
fn index_rejects_non_numeric_pagination() {
    let conn = open_db_in_memory().unwrap();

    let response = api::index(
        &service(&conn),
        &ListParams {
            page: PageParams {
                page: Some("two".to_string()),
                limit: None,
            },
            node_value: None,
        },
    );
    assert_eq!(response.status, 400);
    assert_eq!(message(&response), api::MSG_INVALID_PAGINATION);
}

#[test]
fn show_distinguishes_invalid_and_missing_ids() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = seed(&conn, "run", (1, 10, 0));

    let found = api::show(&service, &IdBody { id: Some(id.clone()) });
    assert_eq!(found.status, 200);
    assert_eq!(found.body["_id"], json!(id));

    let invalid = api::show(&service, &IdBody { id: Some("xyz".to_string()) });
    assert_eq!(invalid.status, 400);
    assert_eq!(message(&invalid), "Invalid node ID");

    let absent = api::show(&service, &IdBody { id: None });
    assert_eq!(absent.status, 400);

    let missing = api::show(
        &service,
        &IdBody {
            id: Some("11111111-2222-4333-8444-555555555555".to_string()),
        },
    );
    assert_eq!(missing.status, 404);
    assert_eq!(message(&missing), "Node not found");
}

#[test]
fn update_returns_message_and_node() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = seed(&conn, "run", (1, 10, 0));

    let response = api::update(
        &service,
        &NodeBody {
            id: Some(id.clone()),
            node_value: Some("walk".to_string()),
            activity_data: Some(json!([1])),
        },
    );
    assert_eq!(response.status, 200);
    assert_eq!(message(&response), api::MSG_UPDATED);
    assert_eq!(response.body["node"]["_id"], json!(id));
    assert_eq!(response.body["node"]["nodeValue"], json!("walk"));

    let missing_value = api::update(
        &service,
        &NodeBody {
            id: Some(id),
            node_value: None,
            activity_data: None,
        },
    );
    assert_eq!(missing_value.status, 400);
}

#[test]
fn destroy_is_repeatable_and_hides_the_node() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = seed(&conn, "run", (1, 10, 0));
    let body = IdBody { id: Some(id) };

    let first = api::destroy(&service, &body);
    assert_eq!(first.status, 200);
    assert_eq!(first.body, json!({"message": api::MSG_DELETED}));

    let second = api::destroy(&service, &body);
    assert_eq!(second.status, 200);

    assert_eq!(api::show(&service, &body).status, 404);
}

#[test]
fn filter_by_timestamp_is_paged_and_inclusive() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "run", (1, 9, 59));
    seed(&conn, "run", (1, 10, 0));
    seed(&conn, "run", (1, 10, 30));
    seed(&conn, "run", (1, 11, 0));
    seed(&conn, "swim", (1, 10, 15));

    let body: TimestampFilterBody = parse_body(
        r#"{"startDate":"01/03/2024 10:00:00","endDate":"01/03/2024 11:00:00","nodeValue":"run"}"#,
    )
    .unwrap();
    let response = api::filter_by_timestamp(&service(&conn), &body, &PageParams::default());

    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"].as_array().unwrap().len(), 3);
    assert_eq!(response.body["currentPage"], json!(1));
    assert_eq!(response.body["totalPages"], json!(1));
}

#[test]
fn filter_by_timestamp_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let missing = api::filter_by_timestamp(
        &service,
        &TimestampFilterBody {
            start_date: Some("01/03/2024 10:00:00".to_string()),
            end_date: None,
            node_value: Some("run".to_string()),
        },
        &PageParams::default(),
    );
    assert_eq!(missing.status, 400);
    assert_eq!(message(&missing), api::MSG_EXPLICIT_REQUIRED);

    let malformed = api::filter_by_timestamp(
        &service,
        &TimestampFilterBody {
            start_date: Some("yesterday".to_string()),
            end_date: Some("01/03/2024 10:00:00".to_string()),
            node_value: Some("run".to_string()),
        },
        &PageParams::default(),
    );
    assert_eq!(malformed.status, 400);
    assert_eq!(
        message(&malformed),
        "Invalid date format. Please use dd/mm/yyyy hh:mm:ss"
    );
}

#[test]
fn filter_by_time_range_has_no_page_metadata() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "run", (1, 9, 30));
    seed(&conn, "run", (1, 7, 0));

    let body: TimeRangeBody = parse_body(
        r#"{"timeRange":"1h","nodeValue":"run","startDate":"ignored","endDate":"01/03/2024 10:00:00"}"#,
    )
    .unwrap();
    let response = api::filter_by_time_range(&service(&conn), &body);

    assert_eq!(response.status, 200);
    let object = response.body.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert_eq!(object["data"].as_array().unwrap().len(), 1);
    assert!(!object.contains_key("currentPage"));
    assert!(!object.contains_key("totalPages"));
}

#[test]
fn filter_by_time_range_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let missing = api::filter_by_time_range(
        &service,
        &TimeRangeBody {
            time_range: None,
            node_value: Some("run".to_string()),
            ..TimeRangeBody::default()
        },
    );
    assert_eq!(missing.status, 400);
    assert_eq!(message(&missing), api::MSG_RELATIVE_REQUIRED);

    let bad_token = api::filter_by_time_range(
        &service,
        &TimeRangeBody {
            time_range: Some("2w".to_string()),
            node_value: Some("run".to_string()),
            ..TimeRangeBody::default()
        },
    );
    assert_eq!(bad_token.status, 400);
    assert_eq!(message(&bad_token), "Invalid timeRange value");
}

#[test]
fn corrupted_stored_row_is_internal_error() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = seed(&conn, "run", (1, 10, 0));
    conn.execute("UPDATE nodes SET node_value = '' WHERE id = ?1;", [&id])
        .unwrap();

    let listed = api::index(&service, &ListParams::default());
    assert_eq!(listed.status, 500);
    assert!(message(&listed).starts_with("An error occurred:"));

    let shown = api::show(&service, &IdBody { id: Some(id) });
    assert_eq!(shown.status, 500);
}

struct StaticDevices(Result<Vec<DeviceRecord>, DeviceStoreError>);

impl DeviceStore for StaticDevices {
    fn query_devices(&self, _range: &DeviceRange) -> Result<Vec<DeviceRecord>, DeviceStoreError> {
        self.0.clone()
    }
}

fn device(id: &str, device_ids: &[&str]) -> DeviceRecord {
    DeviceRecord {
        id: id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        device_ids: device_ids.iter().map(|id| id.to_string()).collect(),
        fields: Map::new(),
    }
}

#[test]
fn device_data_filters_by_device_id() {
    let service = DeviceService::with_resolver(
        StaticDevices(Ok(vec![
            device("a", &["d1", "d2"]),
            device("b", &["d3"]),
            device("c", &[]),
        ])),
        TimeWindowResolver::utc(),
    );
    let body = parse_body(r#"{"deviceIds":["d2","d9"]}"#).unwrap();

    let response = api::device_data(&service, &body);
    assert_eq!(response.status, 200);
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], json!("a"));
}

#[test]
fn device_store_failure_is_internal_error() {
    let service = DeviceService::with_resolver(
        StaticDevices(Err(DeviceStoreError::new("unreachable"))),
        TimeWindowResolver::utc(),
    );

    let response = api::device_data(&service, &Default::default());
    assert_eq!(response.status, 500);
    assert_eq!(response.body, json!({"message": "Failed to fetch data"}));
}

#[test]
fn device_data_rejects_malformed_bounds() {
    let service =
        DeviceService::with_resolver(StaticDevices(Ok(Vec::new())), TimeWindowResolver::utc());
    let body = parse_body(r#"{"startDate":"soon"}"#).unwrap();

    let response = api::device_data(&service, &body);
    assert_eq!(response.status, 400);
    assert_eq!(message(&response), api::MSG_INVALID_DATE);
}
