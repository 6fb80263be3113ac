use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row change reported by a change stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single change on a backing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Insert,
            new: Some(record),
            old: None,
        }
    }

    pub fn update(table: impl Into<String>, old: Option<Value>, new: Value) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Update,
            new: Some(new),
            old,
        }
    }

    pub fn delete(table: impl Into<String>, old: Value) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Record snapshot relevant to the event: the old row for deletes,
    /// the new row otherwise
    pub fn record(&self) -> Option<&Value> {
        match self.event_type {
            ChangeKind::Delete => self.old.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref(),
        }
    }
}
