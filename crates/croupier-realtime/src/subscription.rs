//! A single change subscription
//!
//! Owns one backend feed for one collection and keeps it alive: failures
//! schedule a retry after an exponential backoff, and after
//! `max_reconnect_attempts` consecutive failures the subscription gives up
//! and reports a terminal error until `reconnect` is called.
//!
//! Callers must `close` a subscription they no longer need. Dropping it
//! also releases the backend feed.

use std::sync::Arc;
use std::time::Instant;

use croupier_core::{ChangeEvent, CroupierError, CroupierResult};
use croupier_store::{ChangeFeed, ChangeSource, FeedMessage, FeedPoll};

use crate::{ConnectionQuality, ConnectionStatus, SubscriptionConfig, SubscriptionState};

/// Receives every change event delivered by a subscription
pub type EventCallback = Box<dyn FnMut(ChangeEvent) + Send>;

/// Live subscription to one collection's change stream
pub struct Subscription {
    collection: String,
    source: Arc<dyn ChangeSource>,
    config: SubscriptionConfig,
    on_event: EventCallback,
    state: SubscriptionState,
    feed: Option<ChangeFeed>,
    /// Pending automatic retry
    retry_at: Option<Instant>,
    exhausted: bool,
    /// The owner still wants updates (cleared by close)
    wanted: bool,
    paused: bool,
    /// Successful re-establishments over the subscription's life
    reconnects: u64,
}

impl Subscription {
    /// Open a subscription. Fails fast on an empty collection name.
    pub fn open(
        source: Arc<dyn ChangeSource>,
        collection: &str,
        config: SubscriptionConfig,
        on_event: impl FnMut(ChangeEvent) + Send + 'static,
        now: Instant,
    ) -> CroupierResult<Self> {
        if collection.trim().is_empty() {
            return Err(CroupierError::EmptyCollectionName);
        }

        let mut subscription = Subscription {
            collection: collection.to_string(),
            source,
            config,
            on_event: Box::new(on_event),
            state: SubscriptionState::default(),
            feed: None,
            retry_at: None,
            exhausted: false,
            wanted: true,
            paused: false,
            reconnects: 0,
        };
        subscription.connect(now);
        Ok(subscription)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status
    }

    /// Holds a backend feed right now
    pub fn is_live(&self) -> bool {
        self.feed.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// When the next automatic retry fires, if one is scheduled
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Terminal error once retries are exhausted
    pub fn terminal_error(&self) -> Option<CroupierError> {
        if !self.exhausted {
            return None;
        }
        Some(CroupierError::RetriesExhausted {
            collection: self.collection.clone(),
            attempts: self.state.reconnect_attempts,
            last_error: self.state.last_error.clone().unwrap_or_default(),
        })
    }

    pub fn quality(&self, now: Instant) -> ConnectionQuality {
        ConnectionQuality::measure(&self.state, self.reconnects, self.exhausted, now)
    }

    /// Drive the subscription: fire a due retry, then drain the feed.
    /// Returns the number of change events dispatched.
    pub fn poll(&mut self, now: Instant) -> usize {
        if self.paused {
            return 0;
        }

        if let Some(at) = self.retry_at {
            if now >= at {
                self.retry_at = None;
                tracing::debug!(
                    collection = %self.collection,
                    attempt = self.state.reconnect_attempts,
                    "retrying subscription"
                );
                self.connect(now);
            }
        }

        let mut dispatched = 0;
        loop {
            let Some(feed) = self.feed.as_mut() else {
                break;
            };
            match feed.try_next() {
                FeedPoll::Message(FeedMessage::Subscribed) => self.on_subscribed(now),
                FeedPoll::Message(FeedMessage::Change(raw)) => match raw.into_event(now) {
                    Ok(event) => {
                        self.state.total_events_received += 1;
                        self.state.last_event_at = Some(now);
                        (self.on_event)(event);
                        dispatched += 1;
                    }
                    Err(e) => {
                        tracing::warn!(collection = %self.collection, "dropping malformed change: {}", e);
                    }
                },
                FeedPoll::Message(FeedMessage::Error(reason)) => {
                    self.fail(reason, now);
                    break;
                }
                FeedPoll::Closed => {
                    self.fail("change feed closed".to_string(), now);
                    break;
                }
                FeedPoll::Empty => break,
            }
        }
        dispatched
    }

    /// Release the backend feed and reset state. Idempotent.
    pub fn close(&mut self) {
        let was_open = self.wanted || self.feed.is_some() || self.retry_at.is_some();
        self.release_feed();
        self.wanted = false;
        self.paused = false;
        self.retry_at = None;
        self.exhausted = false;
        self.state = SubscriptionState::default();
        if was_open {
            tracing::debug!(collection = %self.collection, "subscription closed");
        }
    }

    /// Manual re-open: clears the retry budget and the last error
    pub fn reconnect(&mut self, now: Instant) {
        self.release_feed();
        self.retry_at = None;
        self.exhausted = false;
        self.paused = false;
        self.wanted = true;
        self.state.reconnect_attempts = 0;
        self.state.last_error = None;
        if matches!(
            self.state.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        ) {
            self.transition(ConnectionStatus::Disconnected);
        }
        self.connect(now);
    }

    /// Host went to the background: drop the feed but remember it is wanted.
    /// An exhausted subscription stays exhausted; only `reconnect` revives it.
    pub fn pause(&mut self) {
        if !self.wanted || self.paused || self.exhausted {
            return;
        }
        self.paused = true;
        self.release_feed();
        self.retry_at = None;
        if self.state.status != ConnectionStatus::Disconnected {
            self.transition(ConnectionStatus::Disconnected);
        }
        tracing::debug!(collection = %self.collection, "subscription paused");
    }

    /// Host is visible again: reopen if nothing is live. The retry budget
    /// carries over from before the pause.
    /// Events missed while paused are not replayed.
    pub fn resume(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if self.feed.is_none() {
            tracing::debug!(collection = %self.collection, "subscription resumed");
            self.connect(now);
        }
    }

    fn connect(&mut self, now: Instant) {
        self.transition(ConnectionStatus::Connecting);
        match self.source.subscribe(&self.collection) {
            Ok(feed) => {
                tracing::trace!(collection = %self.collection, feed = %feed.id(), "feed requested");
                self.feed = Some(feed);
            }
            Err(e) => self.fail(e.to_string(), now),
        }
    }

    fn on_subscribed(&mut self, now: Instant) {
        if self.state.status != ConnectionStatus::Connecting {
            return;
        }
        self.transition(ConnectionStatus::Connected);
        if self.state.reconnect_attempts > 0 {
            self.reconnects += 1;
        }
        self.state.connected_since = Some(now);
        self.state.reconnect_attempts = 0;
        self.state.last_error = None;
        tracing::info!(collection = %self.collection, "subscription connected");
    }

    fn fail(&mut self, reason: String, now: Instant) {
        self.release_feed();
        self.transition(ConnectionStatus::Errored);

        let attempts = self.state.reconnect_attempts;
        if !self.config.allows_retry(attempts) {
            self.exhausted = true;
            self.retry_at = None;
            self.state.last_error = Some(reason);
            if let Some(terminal) = self.terminal_error() {
                tracing::warn!(collection = %self.collection, "{}", terminal);
            }
            return;
        }

        let delay = self.config.retry_delay(attempts);
        self.state.reconnect_attempts = attempts + 1;
        self.retry_at = Some(now + delay);
        tracing::warn!(
            collection = %self.collection,
            attempt = attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "subscription failed: {}",
            reason
        );
        self.state.last_error = Some(reason);
    }

    fn release_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            self.source.unsubscribe(feed.id());
        }
    }

    fn transition(&mut self, next: ConnectionStatus) {
        let current = self.state.status;
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {} -> {}",
            current,
            next
        );
        if next != ConnectionStatus::Connected {
            self.state.connected_since = None;
        }
        self.state.status = next;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_feed();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .field("state", &self.state)
            .field("live", &self.feed.is_some())
            .field("retry_at", &self.retry_at)
            .field("exhausted", &self.exhausted)
            .field("paused", &self.paused)
            .finish()
    }
}
