//! Records - opaque keyed objects stored in collections
//!
//! A record is a JSON object with a mandatory string `id`. Everything else
//! is carried through untouched; `created_at`/`updated_at` are exposed as
//! convenience accessors but never required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CroupierError, CroupierResult, RecordId};

/// Field map of a record (everything except `id`)
pub type Fields = serde_json::Map<String, Value>;

/// Name of the identity field
pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// A stored record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Record {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Build a record from a raw field map, extracting `id`
    pub fn from_fields(mut fields: Fields) -> CroupierResult<Self> {
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => RecordId(s),
            Some(Value::Number(n)) => RecordId(n.to_string()),
            Some(other) => {
                return Err(CroupierError::InvalidRecord(format!(
                    "id must be a non-empty string, got {}",
                    other
                )))
            }
            None => return Err(CroupierError::InvalidRecord("missing id".to_string())),
        };
        Ok(Record { id, fields })
    }

    /// Flatten back into a field map that includes `id`
    pub fn to_fields(&self) -> Fields {
        let mut fields = self.fields.clone();
        fields.insert(ID_FIELD.to_string(), Value::String(self.id.0.clone()));
        fields
    }

    /// Look up a field; `id` resolves to the record id
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == ID_FIELD {
            return Some(Value::String(self.id.0.clone()));
        }
        self.fields.get(key).cloned()
    }

    /// Borrow a non-id field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == ID_FIELD {
            return;
        }
        self.fields.insert(key, value.into());
    }

    /// Apply a partial update. The id is immutable and silently ignored.
    pub fn merge(&mut self, patch: &Fields) {
        for (key, value) in patch {
            if key != ID_FIELD {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CREATED_AT_FIELD)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(UPDATED_AT_FIELD)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(key)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record: Record = serde_json::from_value(json!({
            "id": "c1",
            "name": "Lucky Spin",
            "rating": 4.5,
        }))
        .unwrap();

        assert_eq!(record.id, RecordId::from("c1"));
        assert_eq!(record.field("name"), Some(&json!("Lucky Spin")));
        assert!(!record.fields.contains_key("id"));
    }

    #[test]
    fn test_from_fields_requires_id() {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("x"));
        assert!(matches!(
            Record::from_fields(fields.clone()),
            Err(CroupierError::InvalidRecord(_))
        ));

        fields.insert("id".into(), json!(42));
        let record = Record::from_fields(fields).unwrap();
        assert_eq!(record.id.as_str(), "42");
    }

    #[test]
    fn test_merge_keeps_id() {
        let mut record = Record::new("a").with_field("title", "old");
        let mut patch = Fields::new();
        patch.insert("id".into(), json!("b"));
        patch.insert("title".into(), json!("new"));
        record.merge(&patch);

        assert_eq!(record.id.as_str(), "a");
        assert_eq!(record.get("title"), Some(json!("new")));
        assert_eq!(record.get("id"), Some(json!("a")));
    }

    #[test]
    fn test_timestamps() {
        let record = Record::new("n1")
            .with_field("created_at", "2024-03-01T10:00:00Z")
            .with_field("updated_at", "not a date");
        assert!(record.created_at().is_some());
        assert!(record.updated_at().is_none());
    }
}
