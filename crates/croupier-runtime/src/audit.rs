//! Audit trail for successful mutations
//!
//! Recording is fire-and-forget: an audit sink never fails the mutation
//! that produced the entry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use croupier_core::RecordId;
use croupier_store::Actor;

/// Mutation kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    DeleteMany,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::DeleteMany => "delete_many",
        }
    }
}

/// One audit record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Absent when nobody is signed in
    pub actor: Option<Actor>,
    pub action: AuditAction,
    pub collection: String,
    /// Absent for bulk actions; their ids live in `details`
    pub record_id: Option<RecordId>,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: Option<Actor>,
        action: AuditAction,
        collection: impl Into<String>,
        record_id: Option<RecordId>,
        details: Value,
    ) -> Self {
        AuditEntry {
            actor,
            action,
            collection: collection.into(),
            record_id,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Audit sink
pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Writes entries as structured tracing events
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "croupier::audit",
            action = entry.action.as_str(),
            collection = %entry.collection,
            record_id = entry.record_id.as_ref().map(|id| id.as_str()),
            actor = entry.actor.as_ref().map(|a| a.id.as_str()),
            details = %entry.details,
            "audit"
        );
    }
}

/// Keeps entries in memory
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        MemoryAuditLog::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
