//! Node domain model.
//!
//! # Responsibility
//! - Define the canonical record managed by the node store.
//! - Define the only mutation vocabulary accepted by repositories.
//!
//! # Invariants
//! - `id` and `created_at` are assigned by the store and never change.
//! - `is_deleted` is the source of truth for tombstone state; rows are never
//!   physically removed.
//! - `node_value` is non-empty for every persisted node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque store-assigned identifier.
pub type NodeId = Uuid;

/// Canonical node record.
///
/// Wire names follow the document-store shape consumed by existing clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "_id")]
    pub id: NodeId,
    /// Classification tag used as the primary filter key.
    #[serde(rename = "nodeValue")]
    pub node_value: String,
    /// Opaque caller payload, passed through unvalidated.
    #[serde(rename = "activityData")]
    pub activity_data: Value,
    /// Creation instant; sort key and target of every time-window filter.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,
}

impl Node {
    /// Validates persisted-state invariants.
    pub fn validate(&self) -> Result<(), NodeValidationError> {
        if self.id.is_nil() {
            return Err(NodeValidationError::NilId);
        }
        validate_node_value(&self.node_value)
    }

    /// Returns whether this node is visible to read paths.
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

/// Create input. Identity and creation time are left to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub node_value: String,
    pub activity_data: Value,
}

impl NewNode {
    pub fn new(node_value: impl Into<String>, activity_data: Value) -> Self {
        Self {
            node_value: node_value.into(),
            activity_data,
        }
    }

    pub fn validate(&self) -> Result<(), NodeValidationError> {
        validate_node_value(&self.node_value)
    }
}

/// Mutations a repository may apply to an existing node.
///
/// `Content` replaces both mutable fields and never touches the tombstone;
/// `SoftDelete` only sets the tombstone.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeUpdate {
    Content {
        node_value: String,
        activity_data: Value,
    },
    SoftDelete,
}

impl NodeUpdate {
    pub fn validate(&self) -> Result<(), NodeValidationError> {
        match self {
            Self::Content { node_value, .. } => validate_node_value(node_value),
            Self::SoftDelete => Ok(()),
        }
    }
}

/// Invariant violations on node data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValidationError {
    NilId,
    EmptyNodeValue,
}

impl Display for NodeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "node id must not be nil"),
            Self::EmptyNodeValue => write!(f, "nodeValue must not be empty"),
        }
    }
}

impl Error for NodeValidationError {}

fn validate_node_value(value: &str) -> Result<(), NodeValidationError> {
    if value.trim().is_empty() {
        return Err(NodeValidationError::EmptyNodeValue);
    }
    Ok(())
}
