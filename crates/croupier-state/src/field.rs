//! Record field - the locally held list of records

use croupier_core::{Record, RecordId};

/// Outcome of an upsert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Ordered list of records, never holding two records with the same id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordField {
    records: Vec<Record>,
}

impl RecordField {
    pub fn new() -> Self {
        RecordField::default()
    }

    /// Build from records; a repeated id replaces the earlier entry in place
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut field = RecordField::new();
        for record in records {
            field.upsert(record);
        }
        field
    }

    /// Get a record by id
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Check if a record exists
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.iter().any(|r| &r.id == id)
    }

    /// Replace the record with the same id, or append
    pub fn upsert(&mut self, record: Record) -> Upsert {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record;
                Upsert::Replaced
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    /// Remove a record
    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let pos = self.records.iter().position(|r| &r.id == id)?;
        Some(self.records.remove(pos))
    }

    /// Swap in a fresh page of records
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = Record>) {
        *self = RecordField::from_records(records);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Get number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.iter().map(|r| &r.id)
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }
}
