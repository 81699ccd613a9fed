//! Collection view - query, paginate, select and mutate one collection
//!
//! A view owns the list state for one collection and exposes every change
//! to it as a method. Queries and mutations are async round trips to the
//! store; mutations never patch `items` directly but re-fetch the current
//! page once the store confirms them.
//!
//! In realtime mode the view also owns a [`Subscription`] and a
//! [`Reconciler`]; `tick(now)` moves delivered change events into `items`.
//! Realtime inserts are appended without regard to the current filters or
//! page window, and deletes never touch `total_count`. The next fetch
//! corrects both.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use croupier_core::{
    ChangeEvent, ChangeKind, CroupierError, CroupierResult, Fields, Record, RecordId,
};
use croupier_realtime::{ConnectionQuality, ConnectionStatus, Subscription, SubscriptionConfig};
use croupier_state::{BatchConfig, ReconciliationResult, Reconciler, RecordField};
use croupier_store::{ChangeSource, DataStore, Filters, Query, SortDirection};

use crate::{AuditAction, AuditEntry, Context, Notice};

/// View configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ViewConfig {
    pub page_size: usize,
    /// Initial sort column; empty means unsorted
    pub sort_column: String,
    pub sort_direction: SortDirection,
    /// Text fields the search term is matched against
    pub search_fields: Vec<String>,
    /// Subscribe to the collection's change feed
    pub realtime: bool,
    pub batch: BatchConfig,
    pub subscription: SubscriptionConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            page_size: 10,
            sort_column: "created_at".to_string(),
            sort_direction: SortDirection::Desc,
            search_fields: vec!["name".to_string()],
            realtime: false,
            batch: BatchConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

/// Load phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Errored,
}

/// Everything a list screen renders
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionViewState {
    pub items: RecordField,
    /// Matching rows across all pages, as of the last fetch
    pub total_count: usize,
    /// 1-based
    pub current_page: usize,
    pub page_size: usize,
    pub sort_column: String,
    pub sort_direction: SortDirection,
    pub search_term: String,
    pub filters: Filters,
    pub selected_ids: BTreeSet<RecordId>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CollectionViewState {
    fn new(config: &ViewConfig) -> Self {
        CollectionViewState {
            items: RecordField::new(),
            total_count: 0,
            current_page: 1,
            page_size: config.page_size.max(1),
            sort_column: config.sort_column.clone(),
            sort_direction: config.sort_direction,
            search_term: String::new(),
            filters: Filters::new(),
            selected_ids: BTreeSet::new(),
            loading: false,
            error: None,
        }
    }

    /// Number of pages, never less than one
    pub fn total_pages(&self) -> usize {
        self.total_count.div_ceil(self.page_size).max(1)
    }

    /// Inclusive row window of the current page
    pub fn page_range(&self) -> (usize, usize) {
        let start = (self.current_page - 1) * self.page_size;
        (start, start + self.page_size - 1)
    }
}

/// Realtime plumbing of a view
struct Realtime {
    subscription: Subscription,
    reconciler: Reconciler,
    inbox: mpsc::UnboundedReceiver<ChangeEvent>,
    /// Terminal subscription error already surfaced, as written to `error`
    exhausted_error: Option<String>,
}

/// CRUD state container over one collection
pub struct CollectionView<S> {
    ctx: Context<S>,
    collection: String,
    config: ViewConfig,
    state: CollectionViewState,
    phase: ViewPhase,
    realtime: Option<Realtime>,
}

impl<S: DataStore + 'static> CollectionView<S> {
    pub fn new(ctx: Context<S>, collection: &str, config: ViewConfig) -> CroupierResult<Self> {
        if collection.trim().is_empty() {
            return Err(CroupierError::EmptyCollectionName);
        }
        Ok(CollectionView {
            ctx,
            collection: collection.to_string(),
            state: CollectionViewState::new(&config),
            config,
            phase: ViewPhase::Idle,
            realtime: None,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn state(&self) -> &CollectionViewState {
        &self.state
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn items(&self) -> &[Record] {
        self.state.items.as_slice()
    }

    /// Query for the current parameters
    pub fn query(&self) -> Query {
        let mut query = Query::new();
        for (field, value) in &self.state.filters {
            if is_blank_filter(value) {
                continue;
            }
            query = query.filter(field.clone(), value.clone());
        }

        let term = self.state.search_term.trim();
        if !term.is_empty() && !self.config.search_fields.is_empty() {
            query = query.search(term, self.config.search_fields.clone());
        }

        if !self.state.sort_column.trim().is_empty() {
            query = query.sort(self.state.sort_column.clone(), self.state.sort_direction);
        }

        let (start, end) = self.state.page_range();
        query.range(start, end)
    }

    // Loading

    /// Fetch the current page. On failure the previous items stay in place.
    pub async fn fetch(&mut self) -> CroupierResult<()> {
        let query = self.query();
        self.phase = ViewPhase::Loading;
        self.state.loading = true;

        let result = self.ctx.store.select(&self.collection, &query).await;
        self.state.loading = false;

        match result {
            Ok(page) => {
                tracing::debug!(
                    collection = %self.collection,
                    page = self.state.current_page,
                    rows = page.records.len(),
                    total = page.total_count,
                    "fetched page"
                );
                self.state.items.replace_all(page.records);
                self.state.total_count = page.total_count;
                self.state.error = None;
                self.phase = ViewPhase::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(collection = %self.collection, "fetch failed: {}", e);
                self.state.error = Some(e.to_string());
                self.phase = ViewPhase::Errored;
                self.ctx
                    .notifier
                    .notify(Notice::error(format!("Failed to load {}: {}", self.collection, e)));
                Err(e)
            }
        }
    }

    /// Re-run the current query
    pub async fn refresh(&mut self) -> CroupierResult<()> {
        self.fetch().await
    }

    // Mutations

    pub async fn create(&mut self, data: Fields) -> CroupierResult<Record> {
        let result = self.ctx.store.insert(&self.collection, data.clone()).await;
        match result {
            Ok(record) => {
                self.audit(AuditAction::Create, Some(record.id.clone()), Value::Object(data));
                self.ctx.notifier.notify(Notice::success("Record created"));
                self.refetch_after_mutation().await;
                Ok(record)
            }
            Err(e) => Err(self.mutation_failed(AuditAction::Create, e)),
        }
    }

    pub async fn update(&mut self, id: &RecordId, patch: Fields) -> CroupierResult<Record> {
        let result = self
            .ctx
            .store
            .update(&self.collection, id, patch.clone())
            .await;
        match result {
            Ok(record) => {
                self.audit(AuditAction::Update, Some(id.clone()), Value::Object(patch));
                self.ctx.notifier.notify(Notice::success("Record updated"));
                self.refetch_after_mutation().await;
                Ok(record)
            }
            Err(e) => Err(self.mutation_failed(AuditAction::Update, e)),
        }
    }

    pub async fn delete(&mut self, id: &RecordId) -> CroupierResult<()> {
        let result = self
            .ctx
            .store
            .delete(&self.collection, std::slice::from_ref(id))
            .await;
        match result {
            Ok(()) => {
                self.state.selected_ids.remove(id);
                self.audit(AuditAction::Delete, Some(id.clone()), Value::Null);
                self.ctx.notifier.notify(Notice::success("Record deleted"));
                self.refetch_after_mutation().await;
                Ok(())
            }
            Err(e) => Err(self.mutation_failed(AuditAction::Delete, e)),
        }
    }

    /// Delete several records; the store applies all or none
    pub async fn delete_many(&mut self, ids: &[RecordId]) -> CroupierResult<()> {
        if ids.is_empty() {
            return Err(CroupierError::InvalidQuery("no ids to delete".to_string()));
        }

        let result = self.ctx.store.delete(&self.collection, ids).await;
        match result {
            Ok(()) => {
                for id in ids {
                    self.state.selected_ids.remove(id);
                }
                let listed: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
                self.audit(AuditAction::DeleteMany, None, json!({ "ids": listed }));
                self.ctx
                    .notifier
                    .notify(Notice::success(format!("{} records deleted", ids.len())));
                self.refetch_after_mutation().await;
                Ok(())
            }
            Err(e) => Err(self.mutation_failed(AuditAction::DeleteMany, e)),
        }
    }

    /// Delete every selected record
    pub async fn delete_selected(&mut self) -> CroupierResult<()> {
        let ids: Vec<RecordId> = self.state.selected_ids.iter().cloned().collect();
        self.delete_many(&ids).await
    }

    // Pagination

    /// Go to page `n`, clamped to `[1, total_pages]`. Always re-fetches.
    pub async fn set_page(&mut self, n: usize) -> CroupierResult<()> {
        self.state.current_page = n.clamp(1, self.state.total_pages());
        self.fetch().await
    }

    pub async fn next_page(&mut self) -> CroupierResult<()> {
        self.set_page(self.state.current_page + 1).await
    }

    pub async fn prev_page(&mut self) -> CroupierResult<()> {
        self.set_page(self.state.current_page.saturating_sub(1)).await
    }

    // Query parameters. Each resets to the first page.

    pub async fn set_search_term(&mut self, term: impl Into<String>) -> CroupierResult<()> {
        self.state.search_term = term.into();
        self.reset_and_fetch().await
    }

    pub async fn set_sort_by(&mut self, column: impl Into<String>) -> CroupierResult<()> {
        self.state.sort_column = column.into();
        self.reset_and_fetch().await
    }

    pub async fn set_sort_order(&mut self, direction: SortDirection) -> CroupierResult<()> {
        self.state.sort_direction = direction;
        self.reset_and_fetch().await
    }

    /// Same column flips direction; a new column sorts ascending
    pub async fn toggle_sort(&mut self, column: &str) -> CroupierResult<()> {
        if self.state.sort_column == column {
            self.state.sort_direction = self.state.sort_direction.flip();
        } else {
            self.state.sort_column = column.to_string();
            self.state.sort_direction = SortDirection::Asc;
        }
        self.reset_and_fetch().await
    }

    pub async fn set_filters(&mut self, filters: Filters) -> CroupierResult<()> {
        self.state.filters = filters;
        self.reset_and_fetch().await
    }

    pub async fn set_page_size(&mut self, page_size: usize) -> CroupierResult<()> {
        self.state.page_size = page_size.max(1);
        self.reset_and_fetch().await
    }

    // Selection (local only)

    /// Toggle one id in the selection
    pub fn select_item(&mut self, id: &RecordId) {
        if !self.state.selected_ids.remove(id) {
            self.state.selected_ids.insert(id.clone());
        }
    }

    /// Select every loaded item, or clear if they are all selected already
    pub fn select_all(&mut self) {
        let all_selected = !self.state.items.is_empty()
            && self
                .state
                .items
                .ids()
                .all(|id| self.state.selected_ids.contains(id));
        if all_selected {
            self.state.selected_ids.clear();
        } else {
            self.state.selected_ids = self.state.items.ids().cloned().collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.state.selected_ids.clear();
    }

    // Realtime

    pub fn is_realtime(&self) -> bool {
        self.realtime.is_some()
    }

    /// Subscribe to the collection's changes. No-op if already subscribed.
    pub fn enable_realtime(&mut self, now: Instant) -> CroupierResult<()> {
        if self.realtime.is_some() {
            return Ok(());
        }

        let (tx, inbox) = mpsc::unbounded_channel();
        let source: Arc<dyn ChangeSource> = self.ctx.store.clone();
        let subscription = Subscription::open(
            source,
            &self.collection,
            self.config.subscription.clone(),
            move |event| {
                let _ = tx.send(event);
            },
            now,
        )?;

        self.realtime = Some(Realtime {
            subscription,
            reconciler: Reconciler::with_config(self.config.batch.clone()),
            inbox,
            exhausted_error: None,
        });
        tracing::debug!(collection = %self.collection, "realtime enabled");
        Ok(())
    }

    /// Driver step: pump the subscription and reconcile delivered events
    pub fn tick(&mut self, now: Instant) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        let Some(rt) = self.realtime.as_mut() else {
            return result;
        };

        rt.subscription.poll(now);
        result.absorb(drain_inbox(rt, &mut self.state, Some(now)));
        if let Some(flushed) = rt.reconciler.poll(&mut self.state.items, now) {
            result.absorb(flushed);
        }

        match rt.subscription.terminal_error() {
            Some(err) if rt.exhausted_error.is_none() => {
                let message = err.to_string();
                rt.exhausted_error = Some(message.clone());
                self.state.error = Some(message);
                self.ctx
                    .notifier
                    .notify(Notice::error(format!("Live updates stopped: {}", err)));
            }
            Some(_) => {}
            None => rt.exhausted_error = None,
        }
        result
    }

    /// Earliest instant at which `tick` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let rt = self.realtime.as_ref()?;
        match (rt.reconciler.deadline(), rt.subscription.retry_at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        self.realtime.as_ref().map(|rt| rt.subscription.status())
    }

    pub fn connection_quality(&self, now: Instant) -> Option<ConnectionQuality> {
        self.realtime
            .as_ref()
            .map(|rt| rt.subscription.quality(now))
    }

    /// Queued events not yet applied to `items`
    pub fn pending_events(&self) -> usize {
        self.realtime
            .as_ref()
            .map_or(0, |rt| rt.reconciler.pending())
    }

    /// Manual reconnect after retries ran out
    pub fn reconnect(&mut self, now: Instant) {
        if let Some(rt) = self.realtime.as_mut() {
            // Only clear the error this subscription put there
            if let Some(message) = rt.exhausted_error.take() {
                if self.state.error.as_deref() == Some(message.as_str()) {
                    self.state.error = None;
                }
            }
            rt.subscription.reconnect(now);
        }
    }

    /// Host went to the background
    pub fn pause(&mut self) {
        if let Some(rt) = self.realtime.as_mut() {
            rt.subscription.pause();
        }
    }

    /// Host is visible again. Events missed while paused are picked up by
    /// the re-fetch, not replayed.
    pub async fn resume(&mut self, now: Instant) -> CroupierResult<()> {
        match self.realtime.as_mut() {
            Some(rt) if rt.subscription.is_paused() => {
                rt.subscription.resume(now);
                self.fetch().await
            }
            _ => Ok(()),
        }
    }

    /// Apply delivered events and close the subscription
    pub fn teardown(&mut self) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        let Some(mut rt) = self.realtime.take() else {
            return result;
        };

        result.absorb(drain_inbox(&mut rt, &mut self.state, None));
        result.absorb(rt.reconciler.flush(&mut self.state.items));
        rt.subscription.close();
        tracing::debug!(collection = %self.collection, "realtime torn down");
        result
    }

    // Internals

    async fn reset_and_fetch(&mut self) -> CroupierResult<()> {
        self.state.current_page = 1;
        self.fetch().await
    }

    /// Fetch failures are already surfaced through `error` and the notifier
    async fn refetch_after_mutation(&mut self) {
        if let Err(e) = self.fetch().await {
            tracing::debug!(collection = %self.collection, "refetch after mutation failed: {}", e);
        }
    }

    fn audit(&self, action: AuditAction, record_id: Option<RecordId>, details: Value) {
        let entry = AuditEntry::new(
            self.ctx.actor(),
            action,
            &self.collection,
            record_id,
            details,
        );
        self.ctx.audit.record(entry);
    }

    fn mutation_failed(&mut self, action: AuditAction, err: CroupierError) -> CroupierError {
        tracing::warn!(
            collection = %self.collection,
            action = action.as_str(),
            "mutation failed: {}",
            err
        );
        let verb = match action {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete | AuditAction::DeleteMany => "delete",
        };
        self.state.error = Some(err.to_string());
        self.ctx
            .notifier
            .notify(Notice::error(format!("Failed to {} record: {}", verb, err)));
        err
    }
}

/// Hand delivered events to the reconciler. Deleted records also leave the
/// selection. `now` defaults to each event's receipt time.
fn drain_inbox(
    rt: &mut Realtime,
    state: &mut CollectionViewState,
    now: Option<Instant>,
) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();
    while let Ok(event) = rt.inbox.try_recv() {
        if let ChangeKind::Delete(id) = &event.kind {
            state.selected_ids.remove(id);
        }
        let at = now.unwrap_or(event.received_at);
        result.absorb(rt.reconciler.enqueue(event, &mut state.items, at));
    }
    result
}

/// Filter values that mean "no filter"
fn is_blank_filter(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("all")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use croupier_store::{Actor, MemoryStore, Operation, RawChange};
    use serde_json::json;

    use crate::{MemoryAuditLog, MemoryNotifier, NoticeLevel};

    struct Harness {
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditLog>,
        notifier: Arc<MemoryNotifier>,
    }

    impl Harness {
        fn new(rows: usize) -> Self {
            let store = Arc::new(MemoryStore::new());
            store.create_collection("casinos");
            store.seed(
                "casinos",
                (0..rows).map(|i| {
                    Record::new(format!("c{:02}", i))
                        .with_field("name", format!("Casino {:02}", i))
                        .with_field("rating", (i % 5) as i64)
                        .with_field("status", if i % 2 == 0 { "active" } else { "draft" })
                }),
            );
            Harness {
                store,
                audit: Arc::new(MemoryAuditLog::new()),
                notifier: Arc::new(MemoryNotifier::new()),
            }
        }

        fn view(&self, config: ViewConfig) -> CollectionView<MemoryStore> {
            let ctx = Context::new(self.store.clone())
                .with_audit(self.audit.clone())
                .with_notifier(self.notifier.clone())
                .with_identity(self.store.clone());
            CollectionView::new(ctx, "casinos", config).unwrap()
        }
    }

    fn by_name() -> ViewConfig {
        ViewConfig {
            sort_column: "name".to_string(),
            sort_direction: SortDirection::Asc,
            ..Default::default()
        }
    }

    fn ids(view: &CollectionView<MemoryStore>) -> Vec<String> {
        view.items().iter().map(|r| r.id.to_string()).collect()
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[tokio::test]
    async fn test_fetch_first_page() {
        let h = Harness::new(25);
        let mut view = h.view(by_name());
        assert_eq!(view.phase(), ViewPhase::Idle);

        view.fetch().await.unwrap();
        assert_eq!(view.phase(), ViewPhase::Ready);
        assert_eq!(view.items().len(), 10);
        assert_eq!(view.state().total_count, 25);
        assert_eq!(view.state().total_pages(), 3);
        assert_eq!(ids(&view)[0], "c00");
        assert!(!view.state().loading);
    }

    #[tokio::test]
    async fn test_page_navigation_clamps() {
        let h = Harness::new(25);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();

        view.next_page().await.unwrap();
        assert_eq!(h.store.last_query().unwrap().1.range, Some((10, 19)));
        view.set_page(99).await.unwrap();
        assert_eq!(view.state().current_page, 3);
        assert_eq!(view.items().len(), 5);
        view.next_page().await.unwrap();
        assert_eq!(view.state().current_page, 3);

        view.set_page(0).await.unwrap();
        assert_eq!(view.state().current_page, 1);
        view.prev_page().await.unwrap();
        assert_eq!(view.state().current_page, 1);
        assert_eq!(h.store.last_query().unwrap().1.range, Some((0, 9)));
    }

    #[tokio::test]
    async fn test_page_reset_on_parameter_change() {
        let h = Harness::new(60);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();
        view.set_page(5).await.unwrap();
        assert_eq!(view.state().current_page, 5);

        view.set_search_term("x").await.unwrap();
        assert_eq!(view.state().current_page, 1);
        let (_, query) = h.store.last_query().unwrap();
        assert_eq!(query.range, Some((0, 9)));
        assert_eq!(query.search.unwrap().term, "x");

        view.set_search_term("").await.unwrap();
        for change in 0..4 {
            view.set_page(2).await.unwrap();
            assert_eq!(view.state().current_page, 2);
            match change {
                0 => view.set_sort_by("rating").await.unwrap(),
                1 => view.set_sort_order(SortDirection::Desc).await.unwrap(),
                2 => view.set_filters(Filters::new()).await.unwrap(),
                _ => view.set_page_size(20).await.unwrap(),
            }
            assert_eq!(view.state().current_page, 1);
        }
    }

    #[tokio::test]
    async fn test_blank_filters_are_skipped() {
        let h = Harness::new(10);
        let mut view = h.view(by_name());
        let mut filters = Filters::new();
        filters.insert("status".into(), json!("active"));
        filters.insert("rating".into(), json!("all"));
        filters.insert("region".into(), json!(""));
        filters.insert("owner".into(), Value::Null);
        view.set_filters(filters).await.unwrap();

        let (_, query) = h.store.last_query().unwrap();
        assert_eq!(query.filters.len(), 1);
        assert_eq!(view.state().total_count, 5);
        assert!(view
            .items()
            .iter()
            .all(|r| r.field("status") == Some(&json!("active"))));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let h = Harness::new(25);
        let mut view = h.view(by_name());
        view.set_search_term("CASINO 1").await.unwrap();
        assert_eq!(view.state().total_count, 10);
    }

    #[tokio::test]
    async fn test_toggle_sort() {
        let h = Harness::new(5);
        let mut view = h.view(ViewConfig::default());
        view.toggle_sort("name").await.unwrap();
        assert_eq!(view.state().sort_direction, SortDirection::Asc);
        assert_eq!(ids(&view)[0], "c00");

        view.toggle_sort("name").await.unwrap();
        assert_eq!(view.state().sort_direction, SortDirection::Desc);
        assert_eq!(ids(&view)[0], "c04");

        view.toggle_sort("rating").await.unwrap();
        assert_eq!(view.state().sort_column, "rating");
        assert_eq!(view.state().sort_direction, SortDirection::Asc);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_items() {
        let h = Harness::new(25);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();
        let before = ids(&view);

        h.store
            .fail_next(Operation::Select, CroupierError::TransportError("timeout".into()));
        assert!(view.next_page().await.is_err());
        assert_eq!(view.phase(), ViewPhase::Errored);
        assert_eq!(ids(&view), before);
        assert_eq!(view.state().total_count, 25);
        assert!(view.state().error.as_deref().unwrap().contains("timeout"));
        assert_eq!(h.notifier.messages(NoticeLevel::Error).len(), 1);

        view.refresh().await.unwrap();
        assert!(view.state().error.is_none());
        assert_eq!(view.phase(), ViewPhase::Ready);
    }

    #[tokio::test]
    async fn test_create_audits_and_refetches() {
        let h = Harness::new(3);
        h.store.sign_in(Actor::new("admin-1", "admin"));
        let mut view = h.view(ViewConfig::default());
        view.fetch().await.unwrap();
        let fetches = h.store.query_log().len();

        let record = view
            .create(fields(json!({ "name": "Lucky Star", "rating": 5 })))
            .await
            .unwrap();
        assert_eq!(h.store.query_log().len(), fetches + 1);
        assert_eq!(view.state().total_count, 4);
        // Newest first by created_at
        assert_eq!(view.items()[0].id, record.id);

        let entries = h.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[0].record_id, Some(record.id.clone()));
        assert_eq!(entries[0].actor.as_ref().unwrap().id, "admin-1");
        assert_eq!(entries[0].details["name"], "Lucky Star");
        assert_eq!(h.notifier.messages(NoticeLevel::Success), vec!["Record created"]);
    }

    #[tokio::test]
    async fn test_failed_mutation_surfaces_error() {
        let h = Harness::new(3);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();
        let fetches = h.store.query_log().len();

        let err = view
            .update(&RecordId::from("missing"), fields(json!({ "rating": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, CroupierError::NotFound { .. }));
        assert_eq!(h.store.query_log().len(), fetches);
        assert!(h.audit.is_empty());
        assert_eq!(view.items().len(), 3);
        assert!(view.state().error.is_some());
        assert!(h.notifier.messages(NoticeLevel::Error)[0].starts_with("Failed to update record"));
    }

    #[tokio::test]
    async fn test_delete_many_all_or_nothing() {
        let h = Harness::new(5);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();
        view.select_item(&"c01".into());
        view.select_item(&"c02".into());

        let bad = [RecordId::from("c01"), RecordId::from("nope")];
        assert!(view.delete_many(&bad).await.is_err());
        assert_eq!(h.store.records("casinos").len(), 5);
        assert_eq!(view.state().selected_ids.len(), 2);

        assert!(matches!(
            view.delete_many(&[]).await,
            Err(CroupierError::InvalidQuery(_))
        ));

        view.delete_selected().await.unwrap();
        assert!(view.state().selected_ids.is_empty());
        assert_eq!(view.state().total_count, 3);
        assert_eq!(ids(&view), vec!["c00", "c03", "c04"]);

        let entry = h.audit.entries().pop().unwrap();
        assert_eq!(entry.action, AuditAction::DeleteMany);
        assert_eq!(entry.details, json!({ "ids": ["c01", "c02"] }));
        assert!(entry.actor.is_none());
    }

    #[tokio::test]
    async fn test_selection() {
        let h = Harness::new(3);
        let mut view = h.view(by_name());
        view.fetch().await.unwrap();

        view.select_item(&"c00".into());
        view.select_item(&"c00".into());
        assert!(view.state().selected_ids.is_empty());

        view.select_item(&"c01".into());
        view.select_all();
        assert_eq!(view.state().selected_ids.len(), 3);
        view.select_all();
        assert!(view.state().selected_ids.is_empty());

        view.select_all();
        view.clear_selection();
        assert!(view.state().selected_ids.is_empty());
        assert_eq!(h.store.query_log().len(), 1);
    }

    #[tokio::test]
    async fn test_realtime_delete_keeps_total_count() {
        let h = Harness::new(25);
        let mut view = h.view(by_name());
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.fetch().await.unwrap();
        view.tick(now);
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Connected));

        let doomed = h.store.records("casinos")[3].clone();
        h.store
            .inject_change("casinos", RawChange::delete(doomed.clone()));
        let result = view.tick(now);

        assert_eq!(result.removed, 1);
        assert!(!view.state().items.contains(&doomed.id));
        assert_eq!(view.items().len(), 9);
        assert_eq!(view.state().total_count, 25);
    }

    #[tokio::test]
    async fn test_realtime_updates_are_debounced() {
        let h = Harness::new(3);
        let mut view = h.view(by_name());
        let t0 = Instant::now();
        view.enable_realtime(t0).unwrap();
        view.fetch().await.unwrap();
        view.tick(t0);

        let updated = Record::new("c01").with_field("name", "Renamed");
        h.store
            .inject_change("casinos", RawChange::update(updated, None));
        view.tick(t0);
        assert_eq!(view.pending_events(), 1);
        assert_eq!(view.next_deadline(), Some(t0 + Duration::from_millis(300)));

        view.tick(t0 + Duration::from_millis(299));
        assert_eq!(view.pending_events(), 1);
        let result = view.tick(t0 + Duration::from_millis(300));
        assert_eq!(result.replaced, 1);
        assert_eq!(
            view.state().items.get(&"c01".into()).unwrap().field("name"),
            Some(&json!("Renamed"))
        );
    }

    // A created record outside the current window still lands in `items`
    // through the realtime flush, until the next fetch drops it again.
    #[tokio::test]
    async fn test_realtime_insert_overflows_page_until_next_fetch() {
        let h = Harness::new(10);
        let mut view = h.view(by_name());
        let t0 = Instant::now();
        view.enable_realtime(t0).unwrap();
        view.tick(t0);

        view.create(fields(json!({ "id": "zz", "name": "Zeta" })))
            .await
            .unwrap();
        assert_eq!(view.items().len(), 10);
        assert!(!view.state().items.contains(&"zz".into()));

        view.tick(t0);
        view.tick(t0 + Duration::from_millis(300));
        assert_eq!(view.items().len(), 11);
        assert!(view.state().items.contains(&"zz".into()));

        view.refresh().await.unwrap();
        assert_eq!(view.items().len(), 10);
        assert_eq!(view.state().total_count, 11);
    }

    #[tokio::test]
    async fn test_teardown_flushes_and_closes() {
        let h = Harness::new(2);
        let mut view = h.view(by_name());
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.fetch().await.unwrap();
        view.tick(now);
        assert_eq!(h.store.subscriber_count("casinos"), 1);

        h.store
            .inject_change("casinos", RawChange::insert(Record::new("late")));
        view.tick(now);
        assert_eq!(view.pending_events(), 1);

        let result = view.teardown();
        assert_eq!(result.inserted, 1);
        assert!(view.state().items.contains(&"late".into()));
        assert!(!view.is_realtime());
        assert_eq!(h.store.subscriber_count("casinos"), 0);
        assert!(view.teardown().flushes == 0);
    }

    #[tokio::test]
    async fn test_teardown_drops_deleted_from_selection() {
        let h = Harness::new(3);
        let mut view = h.view(by_name());
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.fetch().await.unwrap();
        view.select_item(&"c00".into());
        view.select_item(&"c01".into());

        // Events already handed over by the subscription but not yet ticked
        let (tx, inbox) = mpsc::unbounded_channel();
        view.realtime.as_mut().unwrap().inbox = inbox;
        tx.send(ChangeEvent::delete("c00", now)).unwrap();

        let result = view.teardown();
        assert_eq!(result.removed, 1);
        assert!(!view.state().items.contains(&"c00".into()));
        let selected: Vec<_> = view.state().selected_ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(selected, vec!["c01"]);
    }

    #[tokio::test]
    async fn test_exhausted_subscription_is_surfaced_once() {
        let h = Harness::new(2);
        let config = ViewConfig {
            subscription: SubscriptionConfig {
                max_reconnect_attempts: 0,
                ..Default::default()
            },
            ..by_name()
        };
        let mut view = h.view(config);
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.tick(now);

        h.store.disconnect_feeds("socket closed");
        view.tick(now);
        view.tick(now);
        assert!(view.state().error.as_deref().unwrap().contains("gave up"));
        assert_eq!(h.notifier.messages(NoticeLevel::Error).len(), 1);

        assert_eq!(
            view.state().error.as_deref(),
            Some("Subscription to casinos gave up after 0 reconnect attempts: socket closed")
        );

        view.reconnect(now);
        view.tick(now);
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Connected));
        assert!(view.state().error.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_keeps_unrelated_fetch_error() {
        let h = Harness::new(2);
        let config = ViewConfig {
            subscription: SubscriptionConfig {
                max_reconnect_attempts: 0,
                ..Default::default()
            },
            ..by_name()
        };
        let mut view = h.view(config);
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.tick(now);
        h.store.disconnect_feeds("socket closed");
        view.tick(now);

        h.store.fail_next(
            Operation::Select,
            CroupierError::TransportError("timeout".into()),
        );
        assert!(view.fetch().await.is_err());
        let fetch_error = view.state().error.clone();
        assert!(fetch_error.as_deref().unwrap().contains("timeout"));

        view.reconnect(now);
        view.tick(now);
        assert_eq!(view.state().error, fetch_error);
    }

    #[test]
    fn test_empty_collection_rejected() {
        let store = Arc::new(MemoryStore::new());
        let result = CollectionView::new(Context::new(store), " ", ViewConfig::default());
        assert!(matches!(result, Err(CroupierError::EmptyCollectionName)));
    }
}
