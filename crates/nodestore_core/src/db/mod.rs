//! SQLite storage for activity nodes.
//!
//! A node store is a single `nodes` table: UUID text id, `node_value`,
//! `activity_data` as serialized JSON, `created_at` as epoch milliseconds
//! (UTC) and an `is_deleted` tombstone restricted to 0/1 by a CHECK
//! constraint. Two indexes serve the read paths: `(node_value, created_at)`
//! for value plus time-window filters and `(is_deleted, created_at)` for the
//! newest-first live listing.
//!
//! Schema versions are tracked in `PRAGMA user_version`; connections handed
//! out by [`open_db`] and [`open_db_in_memory`] are already at
//! [`migrations::latest_version`].

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
