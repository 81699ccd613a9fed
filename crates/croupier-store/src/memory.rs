//! In-memory data store
//!
//! Implements the full store contract in-process: tables, change feeds,
//! and the signed-in session. Failure injection (offline mode, scripted
//! failures, dropped feeds) and a query log make it the backend for tests,
//! benches and demos.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use croupier_core::{
    CroupierError, CroupierResult, FeedId, Fields, Record, RecordId, CREATED_AT_FIELD, ID_FIELD,
    UPDATED_AT_FIELD,
};

use crate::{
    compare_values, Actor, ChangeFeed, ChangeSource, DataStore, FeedMessage, FeedSender,
    IdentityProvider, Page, Query, RawChange, SortDirection,
};

/// Store operations that can be scripted to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Subscribe,
}

struct Subscriber {
    id: FeedId,
    collection: String,
    tx: FeedSender,
}

#[derive(Default)]
struct Inner {
    /// Rows per collection, in insertion order
    tables: HashMap<String, Vec<Record>>,
    subscribers: Vec<Subscriber>,
    next_feed: u64,
    offline: bool,
    failures: HashMap<Operation, VecDeque<CroupierError>>,
    query_log: Vec<(String, Query)>,
    session: Option<Actor>,
}

impl Inner {
    fn take_failure(&mut self, op: Operation) -> CroupierResult<()> {
        if let Some(err) = self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        if self.offline {
            return Err(CroupierError::TransportError("network unreachable".to_string()));
        }
        Ok(())
    }

    fn table(&self, collection: &str) -> CroupierResult<&Vec<Record>> {
        self.tables
            .get(collection)
            .ok_or_else(|| CroupierError::UnknownCollection(collection.to_string()))
    }

    fn table_mut(&mut self, collection: &str) -> CroupierResult<&mut Vec<Record>> {
        self.tables
            .get_mut(collection)
            .ok_or_else(|| CroupierError::UnknownCollection(collection.to_string()))
    }

    /// Push a change to every live feed on the collection, pruning dead ones
    fn broadcast(&mut self, collection: &str, change: RawChange) {
        self.subscribers.retain(|sub| {
            if sub.collection != collection {
                return true;
            }
            sub.tx.send(FeedMessage::Change(change.clone())).is_ok()
        });
    }

    fn fail_feeds(&mut self, reason: &str) {
        for sub in self.subscribers.drain(..) {
            let _ = sub.tx.send(FeedMessage::Error(reason.to_string()));
        }
    }
}

fn validate_collection(collection: &str) -> CroupierResult<()> {
    if collection.trim().is_empty() {
        return Err(CroupierError::EmptyCollectionName);
    }
    Ok(())
}

fn now_stamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// In-memory store with change feeds
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Create an empty collection (no-op if it exists)
    pub fn create_collection(&self, collection: &str) {
        self.inner
            .lock()
            .tables
            .entry(collection.to_string())
            .or_default();
    }

    /// Load rows directly, without emitting change events
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        let mut inner = self.inner.lock();
        let table = inner.tables.entry(collection.to_string()).or_default();
        for record in records {
            match table.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => table.push(record),
            }
        }
    }

    /// Snapshot of a collection's rows
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.inner
            .lock()
            .tables
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Go offline or back online. Going offline kills every live feed.
    pub fn set_online(&self, online: bool) {
        let mut inner = self.inner.lock();
        inner.offline = !online;
        if !online {
            inner.fail_feeds("network unreachable");
        }
        tracing::debug!(online, "memory store connectivity changed");
    }

    /// Make the next call of `op` fail with `err`. Calls queue up.
    pub fn fail_next(&self, op: Operation, err: CroupierError) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Drop every live feed with an error, as a server restart would
    pub fn disconnect_feeds(&self, reason: &str) {
        self.inner.lock().fail_feeds(reason);
    }

    /// Push a raw change to a collection's feeds without touching rows
    pub fn inject_change(&self, collection: &str, change: RawChange) {
        self.inner.lock().broadcast(collection, change);
    }

    /// Every select issued so far, oldest first
    pub fn query_log(&self) -> Vec<(String, Query)> {
        self.inner.lock().query_log.clone()
    }

    pub fn last_query(&self) -> Option<(String, Query)> {
        self.inner.lock().query_log.last().cloned()
    }

    /// Number of live feeds on a collection
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.collection == collection && !s.tx.is_closed())
            .count()
    }

    pub fn sign_in(&self, actor: Actor) {
        self.inner.lock().session = Some(actor);
    }

    pub fn sign_out(&self) {
        self.inner.lock().session = None;
    }
}

impl ChangeSource for MemoryStore {
    fn subscribe(&self, collection: &str) -> CroupierResult<ChangeFeed> {
        validate_collection(collection)?;
        let mut inner = self.inner.lock();
        if let Some(err) = inner
            .failures
            .get_mut(&Operation::Subscribe)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }

        inner.next_feed += 1;
        let id = FeedId::new(inner.next_feed);
        let (tx, feed) = ChangeFeed::channel(id);

        if inner.offline {
            // The channel opens but the handshake never completes
            let _ = tx.send(FeedMessage::Error("network unreachable".to_string()));
            return Ok(feed);
        }

        let _ = tx.send(FeedMessage::Subscribed);
        inner.subscribers.push(Subscriber {
            id,
            collection: collection.to_string(),
            tx,
        });
        tracing::trace!(%collection, feed = %id, "feed opened");
        Ok(feed)
    }

    fn unsubscribe(&self, feed: FeedId) {
        self.inner.lock().subscribers.retain(|s| s.id != feed);
    }
}

impl DataStore for MemoryStore {
    async fn select(&self, collection: &str, query: &Query) -> CroupierResult<Page> {
        validate_collection(collection)?;
        query.validate()?;
        let mut inner = self.inner.lock();
        inner
            .query_log
            .push((collection.to_string(), query.clone()));
        inner.take_failure(Operation::Select)?;

        let mut rows: Vec<Record> = inner
            .table(collection)?
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.column).as_ref(), b.get(&sort.column).as_ref());
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total_count = rows.len();
        let records = match query.range {
            Some((start, end)) => rows
                .into_iter()
                .skip(start)
                .take(end - start + 1)
                .collect(),
            None => rows,
        };

        Ok(Page {
            records,
            total_count,
        })
    }

    async fn insert(&self, collection: &str, mut data: Fields) -> CroupierResult<Record> {
        validate_collection(collection)?;
        let mut inner = self.inner.lock();
        inner.take_failure(Operation::Insert)?;

        if !data.contains_key(ID_FIELD) {
            let id = format!("{:032x}", rand::random::<u128>());
            data.insert(ID_FIELD.to_string(), Value::String(id));
        }
        let stamp = now_stamp();
        data.entry(CREATED_AT_FIELD.to_string())
            .or_insert_with(|| stamp.clone());
        data.entry(UPDATED_AT_FIELD.to_string()).or_insert(stamp);
        let record = Record::from_fields(data)?;

        let table = inner.table_mut(collection)?;
        if table.iter().any(|r| r.id == record.id) {
            return Err(CroupierError::ConstraintViolation(format!(
                "duplicate id {} in {}",
                record.id, collection
            )));
        }
        table.push(record.clone());
        inner.broadcast(collection, RawChange::insert(record.clone()));
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        patch: Fields,
    ) -> CroupierResult<Record> {
        validate_collection(collection)?;
        let mut inner = self.inner.lock();
        inner.take_failure(Operation::Update)?;

        let table = inner.table_mut(collection)?;
        let existing = table
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| CroupierError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
        let old = existing.clone();
        existing.merge(&patch);
        if !patch.contains_key(UPDATED_AT_FIELD) {
            existing.set(UPDATED_AT_FIELD, now_stamp());
        }
        let updated = existing.clone();
        inner.broadcast(collection, RawChange::update(updated.clone(), Some(old)));
        Ok(updated)
    }

    async fn delete(&self, collection: &str, ids: &[RecordId]) -> CroupierResult<()> {
        validate_collection(collection)?;
        if ids.is_empty() {
            return Err(CroupierError::InvalidQuery("no ids to delete".to_string()));
        }
        let mut inner = self.inner.lock();
        inner.take_failure(Operation::Delete)?;

        let table = inner.table_mut(collection)?;
        if let Some(missing) = ids.iter().find(|id| !table.iter().any(|r| &r.id == *id)) {
            return Err(CroupierError::NotFound {
                collection: collection.to_string(),
                id: missing.clone(),
            });
        }

        let mut removed = Vec::with_capacity(ids.len());
        table.retain(|r| {
            if ids.contains(&r.id) {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
        for record in removed {
            inner.broadcast(collection, RawChange::delete(record));
        }
        Ok(())
    }
}

impl IdentityProvider for MemoryStore {
    fn current_actor(&self) -> Option<Actor> {
        self.inner.lock().session.clone()
    }
}
