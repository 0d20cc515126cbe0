//! Node repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the record-store capability the query dispatcher depends on.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Every read filter excludes soft-deleted rows; there is no opt-out.
//! - Listing order is fixed: `created_at DESC, id ASC`.
//! - `id` and `created_at` are assigned on insert and never rewritten.
//! - Write paths validate input before SQL mutations.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::node::{NewNode, Node, NodeId, NodeUpdate, NodeValidationError};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NODE_SELECT_SQL: &str = "SELECT
    id,
    node_value,
    activity_data,
    created_at,
    is_deleted
FROM nodes";

const NODE_ORDER_SQL: &str = " ORDER BY created_at DESC, id ASC";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "node_value",
    "activity_data",
    "created_at",
    "is_deleted",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for node persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NodeValidationError),
    Db(DbError),
    NotFound(NodeId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "node not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted node data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeValidationError> for RepoError {
    fn from(value: NodeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Inclusive bounds on `created_at`. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatedAtRange {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

/// Read filter over live nodes. Soft-deleted rows never match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub id: Option<NodeId>,
    pub node_value: Option<String>,
    pub created_at: Option<CreatedAtRange>,
}

impl NodeFilter {
    /// Matches every live node.
    pub fn live() -> Self {
        Self::default()
    }

    pub fn by_id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_node_value(mut self, node_value: impl Into<String>) -> Self {
        self.node_value = Some(node_value.into());
        self
    }

    pub fn with_created_at(mut self, range: CreatedAtRange) -> Self {
        self.created_at = Some(range);
        self
    }

    /// Returns whether `node` satisfies this filter.
    ///
    /// Mirrors the SQL predicate so in-process stores behave the same way.
    pub fn matches(&self, node: &Node) -> bool {
        if !node.is_live() {
            return false;
        }
        if self.id.is_some_and(|id| id != node.id) {
            return false;
        }
        if self
            .node_value
            .as_deref()
            .is_some_and(|value| value != node.node_value)
        {
            return false;
        }
        if let Some(range) = self.created_at {
            if range.gte.is_some_and(|gte| node.created_at < gte) {
                return false;
            }
            if range.lte.is_some_and(|lte| node.created_at > lte) {
                return false;
            }
        }
        true
    }
}

/// Skip/limit window for paged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: u64,
    pub limit: u64,
}

/// Record-store capability consumed by the query dispatcher.
pub trait NodeRepository {
    /// Lists live nodes matching `filter`, newest first.
    fn find(&self, filter: &NodeFilter, page: Option<Pagination>) -> RepoResult<Vec<Node>>;
    /// Counts live nodes matching `filter`.
    fn count(&self, filter: &NodeFilter) -> RepoResult<u64>;
    /// Returns the first live node matching `filter`.
    fn find_one(&self, filter: &NodeFilter) -> RepoResult<Option<Node>>;
    /// Persists a new node, assigning `id` and `created_at`.
    fn insert(&self, node: &NewNode) -> RepoResult<Node>;
    /// Applies `update` to the node with `id`, live or deleted.
    ///
    /// Returns `None` when no row with `id` exists.
    fn update_by_id(&self, id: NodeId, update: &NodeUpdate) -> RepoResult<Option<Node>>;
    /// Identifier well-formedness check. Returns the typed id when valid.
    fn parse_id(&self, raw: &str) -> Option<NodeId>;
}

/// SQLite-backed node repository.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
    clock: fn() -> DateTime<Utc>,
    last_created_ms: Cell<i64>,
}

impl<'conn> SqliteNodeRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            clock: Utc::now,
            last_created_ms: Cell::new(i64::MIN),
        })
    }

    /// Replaces the creation-time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn next_created_at(&self) -> RepoResult<DateTime<Utc>> {
        let now_ms = (self.clock)().timestamp_millis();
        let assigned = now_ms.max(self.last_created_ms.get());
        self.last_created_ms.set(assigned);
        millis_to_datetime(assigned)
    }

    fn load_any(&self, id: NodeId) -> RepoResult<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NODE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn find(&self, filter: &NodeFilter, page: Option<Pagination>) -> RepoResult<Vec<Node>> {
        let mut sql = NODE_SELECT_SQL.to_string();
        let mut bind_values = Vec::new();
        push_filter_sql(&mut sql, &mut bind_values, filter);
        sql.push_str(NODE_ORDER_SQL);

        if let Some(page) = page {
            sql.push_str(" LIMIT ? OFFSET ?");
            bind_values.push(Value::Integer(clamp_to_i64(page.limit)));
            bind_values.push(Value::Integer(clamp_to_i64(page.skip)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }

        Ok(nodes)
    }

    fn count(&self, filter: &NodeFilter) -> RepoResult<u64> {
        let mut sql = "SELECT COUNT(*) FROM nodes".to_string();
        let mut bind_values = Vec::new();
        push_filter_sql(&mut sql, &mut bind_values, filter);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn find_one(&self, filter: &NodeFilter) -> RepoResult<Option<Node>> {
        let page = Pagination { skip: 0, limit: 1 };
        Ok(self.find(filter, Some(page))?.into_iter().next())
    }

    fn insert(&self, node: &NewNode) -> RepoResult<Node> {
        node.validate()?;

        let created = Node {
            id: Uuid::new_v4(),
            node_value: node.node_value.clone(),
            activity_data: node.activity_data.clone(),
            created_at: self.next_created_at()?,
            is_deleted: false,
        };

        self.conn.execute(
            "INSERT INTO nodes (
                id,
                node_value,
                activity_data,
                created_at,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                created.id.to_string(),
                created.node_value.as_str(),
                encode_activity_data(&created.activity_data)?,
                created.created_at.timestamp_millis(),
            ],
        )?;

        Ok(created)
    }

    fn update_by_id(&self, id: NodeId, update: &NodeUpdate) -> RepoResult<Option<Node>> {
        update.validate()?;

        let changed = match update {
            NodeUpdate::Content {
                node_value,
                activity_data,
            } => self.conn.execute(
                "UPDATE nodes
                 SET
                    node_value = ?1,
                    activity_data = ?2
                 WHERE id = ?3;",
                params![
                    node_value.as_str(),
                    encode_activity_data(activity_data)?,
                    id.to_string(),
                ],
            )?,
            NodeUpdate::SoftDelete => self.conn.execute(
                "UPDATE nodes SET is_deleted = 1 WHERE id = ?1;",
                [id.to_string()],
            )?,
        };

        if changed == 0 {
            return Ok(None);
        }

        match self.load_any(id)? {
            Some(node) => Ok(Some(node)),
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn parse_id(&self, raw: &str) -> Option<NodeId> {
        parse_node_id(raw)
    }
}

/// Parses a well-formed, non-nil node identifier.
pub fn parse_node_id(raw: &str) -> Option<NodeId> {
    Uuid::parse_str(raw.trim()).ok().filter(|id| !id.is_nil())
}

fn push_filter_sql(sql: &mut String, bind_values: &mut Vec<Value>, filter: &NodeFilter) {
    sql.push_str(" WHERE is_deleted = 0");

    if let Some(id) = filter.id {
        sql.push_str(" AND id = ?");
        bind_values.push(Value::Text(id.to_string()));
    }

    if let Some(node_value) = &filter.node_value {
        sql.push_str(" AND node_value = ?");
        bind_values.push(Value::Text(node_value.clone()));
    }

    if let Some(range) = filter.created_at {
        if let Some(gte) = range.gte {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(Value::Integer(gte.timestamp_millis()));
        }
        if let Some(lte) = range.lte {
            sql.push_str(" AND created_at <= ?");
            bind_values.push(Value::Integer(lte.timestamp_millis()));
        }
    }
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid id value `{id_text}` in nodes.id"))
    })?;

    let activity_text: String = row.get("activity_data")?;
    let activity_data = serde_json::from_str(&activity_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in nodes.activity_data: {err}"))
    })?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in nodes.is_deleted"
            )));
        }
    };

    let node = Node {
        id,
        node_value: row.get("node_value")?,
        activity_data,
        created_at: millis_to_datetime(row.get("created_at")?)?,
        is_deleted,
    };
    node.validate().map_err(|err| {
        RepoError::InvalidData(format!("stored node `{}` is invalid: {err}", node.id))
    })?;
    Ok(node)
}

fn encode_activity_data(value: &serde_json::Value) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("unencodable activityData: {err}")))
}

fn millis_to_datetime(millis: i64) -> RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| RepoError::InvalidData(format!("created_at `{millis}` is out of range")))
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'nodes'
        );",
        [],
        |row| row.get(0),
    )?;
    if table_exists == 0 {
        return Err(RepoError::MissingRequiredTable("nodes"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(nodes);")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    for &column in REQUIRED_COLUMNS {
        if !columns.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: "nodes",
                column,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{clamp_to_i64, parse_node_id, CreatedAtRange, NodeFilter};
    use crate::model::node::Node;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use uuid::Uuid;

    fn node(node_value: &str, is_deleted: bool) -> Node {
        Node {
            id: Uuid::new_v4(),
            node_value: node_value.to_string(),
            activity_data: Value::Null,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            is_deleted,
        }
    }

    #[test]
    fn filter_matches_never_accepts_tombstoned_nodes() {
        let live = node("alpha", false);
        let dead = node("alpha", true);

        assert!(NodeFilter::live().matches(&live));
        assert!(!NodeFilter::live().matches(&dead));
        assert!(!NodeFilter::by_id(dead.id).matches(&dead));
    }

    #[test]
    fn filter_matches_value_and_inclusive_bounds() {
        let target = node("alpha", false);
        let at = target.created_at;

        let inclusive = NodeFilter::live()
            .with_node_value("alpha")
            .with_created_at(CreatedAtRange {
                gte: Some(at),
                lte: Some(at),
            });
        assert!(inclusive.matches(&target));
        assert!(!NodeFilter::live().with_node_value("beta").matches(&target));
    }

    #[test]
    fn parse_node_id_rejects_malformed_and_nil_values() {
        assert!(parse_node_id("not-an-id").is_none());
        assert!(parse_node_id("00000000-0000-0000-0000-000000000000").is_none());
        assert!(parse_node_id("11111111-2222-4333-8444-555555555555").is_some());
    }

    #[test]
    fn clamp_to_i64_saturates() {
        assert_eq!(clamp_to_i64(u64::MAX), i64::MAX);
        assert_eq!(clamp_to_i64(42), 42);
    }
}
