//! Entity Kinds and Chain Events
//!
//! Static mapping from each kind of ledger entity to its place in the
//! hierarchy and to the transaction tags written on its chain.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Department,
    Class,
    Student,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Department, Self::Class, Self::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Class => "class",
            Self::Student => "student",
        }
    }

    /// Capitalized form used in chain names
    pub fn label(&self) -> &'static str {
        match self {
            Self::Department => "Department",
            Self::Class => "Class",
            Self::Student => "Student",
        }
    }

    pub fn parent_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Department => None,
            Self::Class => Some(Self::Department),
            Self::Student => Some(Self::Class),
        }
    }

    pub fn child_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Department => Some(Self::Class),
            Self::Class => Some(Self::Student),
            Self::Student => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_kind().is_none()
    }

    /// Name of the chain owned by entity `id`, e.g. `Class-42`
    pub fn chain_name(&self, id: &str) -> String {
        format!("{}-{}", self.label(), id)
    }

    pub fn genesis_type(&self) -> String {
        format!("{}_genesis", self.as_str())
    }

    pub fn update_type(&self) -> String {
        format!("{}_update", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "department" => Ok(Self::Department),
            "class" => Ok(Self::Class),
            "student" => Ok(Self::Student),
            other => Err(LedgerError::InvalidEvent(format!(
                "unknown entity kind: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Deleted,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl FromStr for EntityStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(LedgerError::SerializationError(format!(
                "unknown entity status: {}",
                other
            ))),
        }
    }
}

/// Kinds of blocks appended after genesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Attendance,
    Update,
    Delete,
}

impl EventKind {
    /// Build the transaction payload for this event on a chain of `owner`.
    pub fn transaction(&self, owner: EntityKind, payload: Value) -> Result<Value, LedgerError> {
        match self {
            Self::Attendance => {
                if owner != EntityKind::Student {
                    return Err(LedgerError::InvalidEvent(format!(
                        "attendance can only be recorded on student chains, not {}",
                        owner
                    )));
                }
                Ok(json!({ "type": "attendance", "attendance": payload }))
            }
            Self::Update => Ok(json!({ "type": owner.update_type(), "data": payload })),
            // Deletion is an update whose data carries the terminal status.
            Self::Delete => {
                let mut data = match payload {
                    Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                data.insert("status".to_string(), json!(EntityStatus::Deleted.as_str()));
                Ok(json!({ "type": owner.update_type(), "data": Value::Object(data) }))
            }
        }
    }

    pub fn resulting_status(&self) -> EntityStatus {
        match self {
            Self::Delete => EntityStatus::Deleted,
            _ => EntityStatus::Active,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attendance => "attendance",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl FromStr for AttendanceStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "leave" => Ok(Self::Leave),
            other => Err(LedgerError::InvalidEvent(format!(
                "unknown attendance status: {}",
                other
            ))),
        }
    }
}

/// Payload of an attendance block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub status: AttendanceStatus,
    pub date: String,
    pub student_name: String,
    pub roll_number: Option<String>,
    pub class_id: Option<String>,
    pub department_id: Option<String>,
}

/// One attendance block as read back from a student chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceEntry {
    pub block_index: u64,
    pub timestamp: String,
    pub status: Option<AttendanceStatus>,
    pub date: Option<String>,
    pub hash: String,
    pub prev_hash: String,
    pub nonce: u64,
}

/// Genesis payload for an entity of `kind`.
pub fn genesis_transaction(kind: EntityKind, payload: Value, parent_chain: Option<String>) -> Value {
    let mut tx = serde_json::Map::new();
    tx.insert("type".to_string(), json!(kind.genesis_type()));
    tx.insert(kind.as_str().to_string(), payload);
    if let Some(parent_chain) = parent_chain {
        tx.insert("parent_chain".to_string(), json!(parent_chain));
    }
    Value::Object(tx)
}
