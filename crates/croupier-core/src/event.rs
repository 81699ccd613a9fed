//! Change event definitions
//!
//! A change event is one insert/update/delete notification for a record
//! in a collection, stamped with the local instant it was received.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Record, RecordId};

/// Change type as reported by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a change
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeKind {
    Insert(Record),
    Update(Record),
    /// Deletes carry only the id of the removed record
    Delete(RecordId),
}

/// Change event - immutable once received
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub received_at: Instant,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, received_at: Instant) -> Self {
        ChangeEvent { kind, received_at }
    }

    pub fn insert(record: Record, received_at: Instant) -> Self {
        Self::new(ChangeKind::Insert(record), received_at)
    }

    pub fn update(record: Record, received_at: Instant) -> Self {
        Self::new(ChangeKind::Update(record), received_at)
    }

    pub fn delete(id: impl Into<RecordId>, received_at: Instant) -> Self {
        Self::new(ChangeKind::Delete(id.into()), received_at)
    }

    pub fn change_type(&self) -> ChangeType {
        match self.kind {
            ChangeKind::Insert(_) => ChangeType::Insert,
            ChangeKind::Update(_) => ChangeType::Update,
            ChangeKind::Delete(_) => ChangeType::Delete,
        }
    }

    /// Id of the affected record
    pub fn record_id(&self) -> &RecordId {
        match &self.kind {
            ChangeKind::Insert(record) | ChangeKind::Update(record) => &record.id,
            ChangeKind::Delete(id) => id,
        }
    }

    /// Record payload for inserts and updates
    pub fn record(&self) -> Option<&Record> {
        match &self.kind {
            ChangeKind::Insert(record) | ChangeKind::Update(record) => Some(record),
            ChangeKind::Delete(_) => None,
        }
    }

    /// Consume the event, yielding the record payload
    pub fn into_record(self) -> Option<Record> {
        match self.kind {
            ChangeKind::Insert(record) | ChangeKind::Update(record) => Some(record),
            ChangeKind::Delete(_) => None,
        }
    }

    #[inline]
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, ChangeKind::Delete(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let now = Instant::now();
        let insert = ChangeEvent::insert(Record::new("r1"), now);
        assert_eq!(insert.change_type(), ChangeType::Insert);
        assert_eq!(insert.record_id().as_str(), "r1");
        assert!(insert.record().is_some());
        assert!(!insert.is_delete());

        let delete = ChangeEvent::delete("r2", now);
        assert_eq!(delete.change_type(), ChangeType::Delete);
        assert_eq!(delete.record_id().as_str(), "r2");
        assert!(delete.record().is_none());
        assert!(delete.into_record().is_none());
    }

    #[test]
    fn test_change_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChangeType::Update).unwrap(),
            "\"UPDATE\""
        );
        let parsed: ChangeType = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(parsed, ChangeType::Delete);
    }
}
