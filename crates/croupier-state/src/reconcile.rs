//! Batching/debounce reconciliation pipeline
//!
//! Change events arrive in bursts. Deletes are applied to the record field
//! immediately; inserts and updates wait in a pending queue that holds at
//! most one event per record id (a newer event replaces the older one in
//! place). The queue is flushed in enqueue order when it reaches
//! `batch_size`, or once `debounce` has passed since the last queued event
//! (trailing edge: every queued event pushes the deadline back).
//!
//! The owner must call `flush` (or `discard`) on teardown; nothing is
//! flushed implicitly.

use std::time::{Duration, Instant};

use croupier_core::{ChangeEvent, ChangeKind};

use crate::{RecordField, Upsert};

/// Batch/debounce thresholds
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Queue length that forces an immediate flush
    pub batch_size: usize,
    /// Quiet period after the last queued event before flushing
    pub debounce: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size: 10,
            debounce: Duration::from_millis(300),
        }
    }
}

/// Reconciliation result for one call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Events appended to the queue
    pub queued: u32,
    /// Events that replaced a queued event for the same id
    pub coalesced: u32,
    /// Records removed by deletes
    pub removed: u32,
    /// Queued events dropped because their record was deleted
    pub purged: u32,
    /// Records appended by flushes
    pub inserted: u32,
    /// Records replaced by flushes
    pub replaced: u32,
    pub flushes: u32,
}

impl ReconciliationResult {
    /// Add another result's counts into this one
    pub fn absorb(&mut self, other: ReconciliationResult) {
        self.queued += other.queued;
        self.coalesced += other.coalesced;
        self.removed += other.removed;
        self.purged += other.purged;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.flushes += other.flushes;
    }

    /// Did this call change the record field?
    pub fn changed_field(&self) -> bool {
        self.removed > 0 || self.inserted > 0 || self.replaced > 0
    }
}

/// Lifetime counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub events: u64,
    pub deletes: u64,
    pub size_flushes: u64,
    pub debounce_flushes: u64,
    pub manual_flushes: u64,
    pub discarded: u64,
}

/// Why a flush happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlushCause {
    Size,
    Debounce,
    Manual,
}

/// Batching reconciler
#[derive(Debug, Default)]
pub struct Reconciler {
    config: BatchConfig,
    /// Pending inserts/updates, unique by record id
    queue: Vec<ChangeEvent>,
    /// Instant of the most recent queued event
    last_enqueue: Option<Instant>,
    stats: ReconcilerStats,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        Reconciler {
            config,
            queue: Vec::new(),
            last_enqueue: None,
            stats: ReconcilerStats::default(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn stats(&self) -> &ReconcilerStats {
        &self.stats
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the debounce flush is due, if anything is queued
    pub fn deadline(&self) -> Option<Instant> {
        if self.queue.is_empty() {
            return None;
        }
        self.last_enqueue.map(|at| at + self.config.debounce)
    }

    /// Accept one change event
    pub fn enqueue(
        &mut self,
        event: ChangeEvent,
        field: &mut RecordField,
        now: Instant,
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        self.stats.events += 1;

        if let ChangeKind::Delete(id) = &event.kind {
            // Bypass the queue; queued changes for this id become no-ops
            self.stats.deletes += 1;
            if field.remove(id).is_some() {
                result.removed = 1;
            }
            let before = self.queue.len();
            self.queue.retain(|queued| queued.record_id() != id);
            result.purged = (before - self.queue.len()) as u32;
            if self.queue.is_empty() {
                self.last_enqueue = None;
            }
            return result;
        }

        match self
            .queue
            .iter()
            .position(|queued| queued.record_id() == event.record_id())
        {
            Some(pos) => {
                self.queue[pos] = event;
                result.coalesced = 1;
            }
            None => {
                self.queue.push(event);
                result.queued = 1;
            }
        }
        self.last_enqueue = Some(now);

        if self.queue.len() >= self.config.batch_size.max(1) {
            result.absorb(self.flush_with(field, FlushCause::Size));
        }
        result
    }

    /// Process a batch of events in order
    pub fn process_events(
        &mut self,
        events: impl IntoIterator<Item = ChangeEvent>,
        field: &mut RecordField,
        now: Instant,
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        for event in events {
            result.absorb(self.enqueue(event, field, now));
        }
        result
    }

    /// Flush if the debounce window has elapsed
    pub fn poll(&mut self, field: &mut RecordField, now: Instant) -> Option<ReconciliationResult> {
        match self.deadline() {
            Some(deadline) if now >= deadline => Some(self.flush_with(field, FlushCause::Debounce)),
            _ => None,
        }
    }

    /// Apply every queued event now, in enqueue order
    pub fn flush(&mut self, field: &mut RecordField) -> ReconciliationResult {
        self.flush_with(field, FlushCause::Manual)
    }

    /// Drop the queue without applying it
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.last_enqueue = None;
        self.stats.discarded += dropped as u64;
        dropped
    }

    fn flush_with(&mut self, field: &mut RecordField, cause: FlushCause) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        self.last_enqueue = None;
        if self.queue.is_empty() {
            return result;
        }

        let batch = std::mem::take(&mut self.queue);
        let size = batch.len();
        for event in batch {
            if let Some(record) = event.into_record() {
                match field.upsert(record) {
                    Upsert::Inserted => result.inserted += 1,
                    Upsert::Replaced => result.replaced += 1,
                }
            }
        }
        result.flushes = 1;

        match cause {
            FlushCause::Size => self.stats.size_flushes += 1,
            FlushCause::Debounce => self.stats.debounce_flushes += 1,
            FlushCause::Manual => self.stats.manual_flushes += 1,
        }
        tracing::trace!(?cause, size, "reconciler flushed");
        result
    }
}
