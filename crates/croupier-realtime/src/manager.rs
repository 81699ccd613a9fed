//! Subscription registry - one subscription per collection

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use croupier_core::{ChangeEvent, CroupierError, CroupierResult, SubscriptionHandle};
use croupier_store::ChangeSource;

use crate::{ConnectionQuality, Subscription, SubscriptionConfig, SubscriptionState};

/// Keeps exactly one subscription per collection name
pub struct SubscriptionManager {
    source: Arc<dyn ChangeSource>,
    config: SubscriptionConfig,
    subscriptions: HashMap<SubscriptionHandle, Subscription>,
    by_collection: HashMap<String, SubscriptionHandle>,
    next_handle: u64,
}

impl SubscriptionManager {
    pub fn new(source: Arc<dyn ChangeSource>) -> Self {
        Self::with_config(source, SubscriptionConfig::default())
    }

    pub fn with_config(source: Arc<dyn ChangeSource>, config: SubscriptionConfig) -> Self {
        SubscriptionManager {
            source,
            config,
            subscriptions: HashMap::new(),
            by_collection: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Open a subscription for `collection`, replacing any existing one
    pub fn open(
        &mut self,
        collection: &str,
        on_event: impl FnMut(ChangeEvent) + Send + 'static,
        now: Instant,
    ) -> CroupierResult<SubscriptionHandle> {
        if collection.trim().is_empty() {
            return Err(CroupierError::EmptyCollectionName);
        }

        // Never two live feeds for one collection
        if let Some(previous) = self.by_collection.remove(collection) {
            if let Some(mut old) = self.subscriptions.remove(&previous) {
                old.close();
                tracing::debug!(%collection, replaced = %previous, "replacing subscription");
            }
        }

        let subscription = Subscription::open(
            Arc::clone(&self.source),
            collection,
            self.config.clone(),
            on_event,
            now,
        )?;

        self.next_handle += 1;
        let handle = SubscriptionHandle::new(self.next_handle);
        self.subscriptions.insert(handle, subscription);
        self.by_collection.insert(collection.to_string(), handle);
        Ok(handle)
    }

    /// Close a subscription. Unknown or already-closed handles are ignored.
    pub fn close(&mut self, handle: SubscriptionHandle) {
        if let Some(subscription) = self.subscriptions.get_mut(&handle) {
            subscription.close();
        }
    }

    /// Close everything
    pub fn close_all(&mut self) {
        for subscription in self.subscriptions.values_mut() {
            subscription.close();
        }
    }

    pub fn reconnect(&mut self, handle: SubscriptionHandle, now: Instant) -> CroupierResult<()> {
        let subscription = self
            .subscriptions
            .get_mut(&handle)
            .ok_or(CroupierError::SubscriptionClosed)?;
        subscription.reconnect(now);
        Ok(())
    }

    /// Drive every subscription. Returns the number of events dispatched.
    pub fn poll(&mut self, now: Instant) -> usize {
        self.subscriptions
            .values_mut()
            .map(|subscription| subscription.poll(now))
            .sum()
    }

    pub fn pause_all(&mut self) {
        for subscription in self.subscriptions.values_mut() {
            subscription.pause();
        }
    }

    pub fn resume_all(&mut self, now: Instant) {
        for subscription in self.subscriptions.values_mut() {
            subscription.resume(now);
        }
    }

    pub fn handle_for(&self, collection: &str) -> Option<SubscriptionHandle> {
        self.by_collection.get(collection).copied()
    }

    pub fn get(&self, handle: SubscriptionHandle) -> Option<&Subscription> {
        self.subscriptions.get(&handle)
    }

    pub fn state(&self, handle: SubscriptionHandle) -> Option<&SubscriptionState> {
        self.subscriptions.get(&handle).map(Subscription::state)
    }

    pub fn quality(&self, handle: SubscriptionHandle, now: Instant) -> Option<ConnectionQuality> {
        self.subscriptions.get(&handle).map(|s| s.quality(now))
    }

    /// Earliest pending automatic retry across all subscriptions
    pub fn next_retry(&self) -> Option<Instant> {
        self.subscriptions.values().filter_map(Subscription::retry_at).min()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
