//! End-to-end realtime convergence testing
//!
//! Replays a change storm through a `MemoryStore` into a realtime
//! `CollectionView` on a synthetic clock and checks that the view ends up
//! holding exactly what sequential application of the delivered changes
//! would produce. Changes emitted while no feed is live are lost, as they
//! are on a real backend; the model skips them too.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use croupier_core::{CroupierResult, Record, RecordId};
use croupier_realtime::{ConnectionStatus, Health};
use croupier_runtime::{CollectionView, Context, ViewConfig};
use croupier_store::{MemoryStore, RawChange};

use crate::{EventStorm, StormAction, StormConfig, StormStep, CASINOS};

/// Storm run result
#[derive(Clone, Debug, Default)]
pub struct StormResult {
    pub steps: usize,
    /// Changes that reached a live feed
    pub delivered: usize,
    /// Changes emitted while no feed was live
    pub lost: usize,
    pub disconnects: usize,
    pub flushes: u32,
    pub final_len: usize,
    pub duplicate_ids: usize,
    /// Ids whose final state differs from the model
    pub mismatched: Vec<RecordId>,
    pub final_status: Option<ConnectionStatus>,
    pub final_health: Option<Health>,
}

impl StormResult {
    pub fn passed(&self) -> bool {
        self.duplicate_ids == 0 && self.mismatched.is_empty()
    }
}

/// Drives one realtime view through a storm
pub struct RealtimeHarness {
    store: Arc<MemoryStore>,
    view: CollectionView<MemoryStore>,
    /// id -> version, from the delivered changes only
    model: BTreeMap<RecordId, u64>,
    now: Instant,
}

impl RealtimeHarness {
    pub fn new(config: ViewConfig) -> CroupierResult<Self> {
        let store = Arc::new(MemoryStore::new());
        store.create_collection(CASINOS);

        let mut view = CollectionView::new(Context::new(store.clone()), CASINOS, config)?;
        let now = Instant::now();
        view.enable_realtime(now)?;
        view.tick(now);

        Ok(RealtimeHarness {
            store,
            view,
            model: BTreeMap::new(),
            now,
        })
    }

    pub fn view(&self) -> &CollectionView<MemoryStore> {
        &self.view
    }

    /// Replay `steps`, let the view settle, and compare
    pub fn run(&mut self, steps: &[StormStep]) -> StormResult {
        let mut result = StormResult {
            steps: steps.len(),
            ..Default::default()
        };

        for step in steps {
            self.now += step.gap;
            result.flushes += self.view.tick(self.now).flushes;

            if step.action == StormAction::Disconnect {
                self.store.disconnect_feeds("storm");
                result.disconnects += 1;
            } else if self.store.subscriber_count(CASINOS) == 0 {
                result.lost += 1;
            } else {
                self.deliver(&step.action);
                result.delivered += 1;
            }

            result.flushes += self.view.tick(self.now).flushes;
        }

        // Longer than any retry delay in play and the debounce window
        self.now += Duration::from_secs(2);
        result.flushes += self.view.tick(self.now).flushes;

        self.compare(&mut result);
        result
    }

    fn deliver(&mut self, action: &StormAction) {
        let change = match action {
            StormAction::Insert(record) | StormAction::Update(record) => {
                let version = record
                    .field("version")
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default();
                self.model.insert(record.id.clone(), version);
                if matches!(action, StormAction::Insert(_)) {
                    RawChange::insert(record.clone())
                } else {
                    RawChange::update(record.clone(), None)
                }
            }
            StormAction::Delete(id) => {
                self.model.remove(id);
                RawChange::delete(Record::new(id.clone()))
            }
            StormAction::Disconnect => return,
        };
        self.store.inject_change(CASINOS, change);
    }

    fn compare(&self, result: &mut StormResult) {
        let items = self.view.items();
        let unique: BTreeSet<&RecordId> = items.iter().map(|r| &r.id).collect();
        result.final_len = items.len();
        result.duplicate_ids = items.len() - unique.len();

        let actual: BTreeMap<RecordId, u64> = items
            .iter()
            .map(|r| {
                let version = r.field("version").and_then(|v| v.as_u64()).unwrap_or_default();
                (r.id.clone(), version)
            })
            .collect();

        let all_ids: BTreeSet<&RecordId> = actual.keys().chain(self.model.keys()).collect();
        result.mismatched = all_ids
            .into_iter()
            .filter(|id| actual.get(*id) != self.model.get(*id))
            .cloned()
            .collect();

        result.final_status = self.view.connection_status();
        result.final_health = self
            .view
            .connection_quality(self.now)
            .map(|quality| quality.health);
    }
}

/// Realtime view config used by the storm scenarios
pub fn storm_view_config() -> ViewConfig {
    ViewConfig {
        realtime: true,
        ..Default::default()
    }
}

/// Run one storm against a fresh harness
pub fn run_storm(config: StormConfig) -> CroupierResult<StormResult> {
    let steps = EventStorm::new(config).generate();
    let mut harness = RealtimeHarness::new(storm_view_config())?;
    Ok(harness.run(&steps))
}

pub fn run_calm_storm() -> CroupierResult<StormResult> {
    run_storm(StormConfig::calm())
}

pub fn run_standard_storm() -> CroupierResult<StormResult> {
    run_storm(StormConfig::default())
}

pub fn run_violent_storm() -> CroupierResult<StormResult> {
    run_storm(StormConfig::violent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use croupier_core::CroupierError;
    use croupier_runtime::{AuditAction, MemoryAuditLog, MemoryNotifier, NoticeLevel};
    use croupier_store::{Actor, DataStore, Filters, Operation, SortDirection};
    use proptest::prelude::*;
    use serde_json::json;

    use crate::{fields, seeded_store};

    #[test]
    fn test_calm_storm_converges() {
        let result = run_calm_storm().unwrap();
        assert!(result.passed(), "{:?}", result.mismatched);
        assert_eq!(result.lost, 0);
        assert_eq!(result.final_status, Some(ConnectionStatus::Connected));
        assert_eq!(result.final_health, Some(Health::Excellent));
    }

    #[test]
    fn test_standard_storm_converges() {
        let result = run_standard_storm().unwrap();
        assert!(result.passed(), "{:?}", result.mismatched);
        assert_eq!(result.delivered, result.steps);
        assert!(result.flushes > 0);
    }

    #[test]
    fn test_violent_storm_converges_across_drops() {
        let result = run_violent_storm().unwrap();
        assert!(result.passed(), "{:?}", result.mismatched);
        assert!(result.disconnects > 0);
        assert!(result.lost > 0);
        assert_eq!(result.final_status, Some(ConnectionStatus::Connected));
        assert_eq!(result.final_health, Some(Health::Good));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_any_storm_converges(seed in any::<u64>(), violent in any::<bool>()) {
            let config = if violent { StormConfig::violent() } else { StormConfig::default() };
            let result = run_storm(config.with_seed(seed)).unwrap();
            prop_assert!(result.passed());
        }
    }

    fn casino_view(store: &Arc<MemoryStore>, config: ViewConfig) -> CollectionView<MemoryStore> {
        CollectionView::new(Context::new(store.clone()), CASINOS, config).unwrap()
    }

    fn listing_config() -> ViewConfig {
        ViewConfig {
            page_size: 10,
            sort_column: "name".to_string(),
            sort_direction: SortDirection::Asc,
            realtime: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_casino_listing_end_to_end() {
        let store = seeded_store(25, 0);
        let mut view = casino_view(&store, listing_config());
        let now = Instant::now();
        view.enable_realtime(now).unwrap();

        view.fetch().await.unwrap();
        assert_eq!(view.items().len(), 10);
        assert_eq!(view.state().total_count, 25);
        assert_eq!(view.state().current_page, 1);

        view.next_page().await.unwrap();
        let (collection, query) = store.last_query().unwrap();
        assert_eq!(collection, CASINOS);
        assert_eq!(query.range, Some((10, 19)));
        assert_eq!(view.state().current_page, 2);

        view.tick(now);
        let victim = view.items()[4].id.clone();
        store.delete(CASINOS, &[victim.clone()]).await.unwrap();
        let result = view.tick(now);

        assert_eq!(result.removed, 1);
        assert!(!view.state().items.contains(&victim));
        assert_eq!(view.items().len(), 9);
        assert_eq!(view.state().total_count, 25);

        view.refresh().await.unwrap();
        assert_eq!(view.state().total_count, 24);
        assert_eq!(view.items().len(), 10);
        view.teardown();
    }

    #[tokio::test]
    async fn test_search_resets_page_before_fetch() {
        let store = seeded_store(60, 0);
        let mut view = casino_view(&store, listing_config());
        view.fetch().await.unwrap();
        view.set_page(5).await.unwrap();
        assert_eq!(store.last_query().unwrap().1.range, Some((40, 49)));

        view.set_search_term("x").await.unwrap();
        assert_eq!(view.state().current_page, 1);
        assert_eq!(store.last_query().unwrap().1.range, Some((0, 9)));
    }

    #[tokio::test]
    async fn test_admin_workflow_is_audited() {
        let store = seeded_store(12, 0);
        store.sign_in(Actor::new("editor-7", "editor"));
        let audit = Arc::new(MemoryAuditLog::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let ctx = Context::new(store.clone())
            .with_audit(audit.clone())
            .with_notifier(notifier.clone())
            .with_identity(store.clone());

        let mut admin = CollectionView::new(ctx.clone(), CASINOS, listing_config()).unwrap();
        let mut public = CollectionView::new(ctx, CASINOS, listing_config()).unwrap();
        let mut published = Filters::new();
        published.insert("status".into(), json!("published"));
        published.insert("rating".into(), json!("all"));
        public.set_filters(published).await.unwrap();
        admin.fetch().await.unwrap();
        assert_eq!(public.state().total_count, 8);
        assert_eq!(admin.state().total_count, 12);

        let created = admin
            .create(fields(json!({ "name": "Aaa New Casino", "status": "draft" })))
            .await
            .unwrap();
        assert_eq!(admin.state().total_count, 13);
        assert_eq!(admin.items()[0].id, created.id);

        admin
            .update(&created.id, fields(json!({ "status": "published" })))
            .await
            .unwrap();
        admin.delete(&"casino-001".into()).await.unwrap();

        let actions: Vec<_> = audit.entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Create, AuditAction::Update, AuditAction::Delete]
        );
        assert!(audit
            .entries()
            .iter()
            .all(|e| e.collection == CASINOS && e.actor.as_ref().unwrap().id == "editor-7"));
        assert_eq!(notifier.messages(NoticeLevel::Success).len(), 3);

        // The public list keeps its own state until it refreshes
        assert_eq!(public.state().total_count, 8);
        public.refresh().await.unwrap();
        assert_eq!(public.state().total_count, 8);
        assert!(public.state().items.contains(&created.id));
    }

    #[tokio::test]
    async fn test_pause_resume_refetches_missed_changes() {
        let store = seeded_store(5, 0);
        let mut view = casino_view(&store, listing_config());
        let now = Instant::now();
        view.enable_realtime(now).unwrap();
        view.fetch().await.unwrap();
        view.tick(now);
        assert_eq!(store.subscriber_count(CASINOS), 1);

        view.pause();
        assert_eq!(store.subscriber_count(CASINOS), 0);
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Disconnected));
        store
            .update(CASINOS, &"casino-002".into(), fields(json!({ "rating": 99 })))
            .await
            .unwrap();
        view.tick(now);
        assert_eq!(
            view.state().items.get(&"casino-002".into()).unwrap().field("rating"),
            Some(&json!(3))
        );

        view.resume(now).await.unwrap();
        view.tick(now);
        assert_eq!(store.subscriber_count(CASINOS), 1);
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Connected));
        assert_eq!(
            view.state().items.get(&"casino-002".into()).unwrap().field("rating"),
            Some(&json!(99))
        );
    }

    #[tokio::test]
    async fn test_offline_then_recovery() {
        let store = seeded_store(15, 0);
        let mut view = casino_view(&store, listing_config());
        let t0 = Instant::now();
        view.enable_realtime(t0).unwrap();
        view.fetch().await.unwrap();
        view.tick(t0);

        store.set_online(false);
        assert!(view.next_page().await.is_err());
        assert_eq!(view.items().len(), 10);
        view.tick(t0);
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Errored));
        assert_eq!(view.next_deadline(), Some(t0 + Duration::from_secs(1)));

        store.set_online(true);
        view.tick(t0 + Duration::from_secs(1));
        assert_eq!(view.connection_status(), Some(ConnectionStatus::Connected));
        let quality = view.connection_quality(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(quality.health, Health::Good);

        view.refresh().await.unwrap();
        assert_eq!(view.items().len(), 5);
        assert!(view.state().error.is_none());
    }

    #[tokio::test]
    async fn test_constraint_violation_is_not_retried() {
        let store = seeded_store(3, 0);
        let mut view = casino_view(&store, listing_config());
        view.fetch().await.unwrap();
        let queries = store.query_log().len();

        let err = view
            .create(fields(json!({ "id": "casino-000", "name": "Duplicate" })))
            .await
            .unwrap_err();
        assert!(matches!(err, CroupierError::ConstraintViolation(_)));
        assert!(!err.is_transient());
        assert_eq!(store.query_log().len(), queries);

        store.fail_next(
            Operation::Insert,
            CroupierError::TransportError("gateway timeout".into()),
        );
        let err = view
            .create(fields(json!({ "name": "Retry Me" })))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.records(CASINOS).len(), 3);
        assert_eq!(view.state().total_count, 3);
    }
}
