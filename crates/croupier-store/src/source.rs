//! Change feeds - the subscribe half of the data store
//!
//! A change source hands out one feed per subscribe call. Feeds are plain
//! unbounded channels: the backend pushes an acknowledgement, then change
//! notifications, and an error message if the feed dies.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use croupier_core::{ChangeEvent, ChangeType, CroupierError, CroupierResult, FeedId, Record};

/// Change notification as the backend delivers it
#[derive(Clone, Debug, PartialEq)]
pub struct RawChange {
    pub event_type: ChangeType,
    pub new_record: Option<Record>,
    pub old_record: Option<Record>,
}

impl RawChange {
    pub fn insert(record: Record) -> Self {
        RawChange {
            event_type: ChangeType::Insert,
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn update(new_record: Record, old_record: Option<Record>) -> Self {
        RawChange {
            event_type: ChangeType::Update,
            new_record: Some(new_record),
            old_record,
        }
    }

    pub fn delete(old_record: Record) -> Self {
        RawChange {
            event_type: ChangeType::Delete,
            new_record: None,
            old_record: Some(old_record),
        }
    }

    /// Convert into a change event stamped with the receive instant
    pub fn into_event(self, received_at: Instant) -> CroupierResult<ChangeEvent> {
        match self.event_type {
            ChangeType::Insert => self
                .new_record
                .map(|r| ChangeEvent::insert(r, received_at))
                .ok_or_else(|| CroupierError::InvalidRecord("insert without new record".into())),
            ChangeType::Update => self
                .new_record
                .map(|r| ChangeEvent::update(r, received_at))
                .ok_or_else(|| CroupierError::InvalidRecord("update without new record".into())),
            ChangeType::Delete => self
                .old_record
                .map(|r| ChangeEvent::delete(r.id, received_at))
                .ok_or_else(|| CroupierError::InvalidRecord("delete without old record".into())),
        }
    }
}

/// Message pushed down a change feed
#[derive(Clone, Debug, PartialEq)]
pub enum FeedMessage {
    /// Backend acknowledged the subscription
    Subscribed,
    Change(RawChange),
    /// Feed failed; no further messages follow
    Error(String),
}

/// Result of a non-blocking feed read
#[derive(Debug, PartialEq)]
pub enum FeedPoll {
    Message(FeedMessage),
    Empty,
    /// Sender side dropped
    Closed,
}

/// Receiving end of one backend subscription
#[derive(Debug)]
pub struct ChangeFeed {
    id: FeedId,
    rx: mpsc::UnboundedReceiver<FeedMessage>,
}

/// Sending end, held by the change source
pub type FeedSender = mpsc::UnboundedSender<FeedMessage>;

impl ChangeFeed {
    /// Create a feed and the sender the backend pushes into
    pub fn channel(id: FeedId) -> (FeedSender, ChangeFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ChangeFeed { id, rx })
    }

    pub fn id(&self) -> FeedId {
        self.id
    }

    /// Read the next message without waiting
    pub fn try_next(&mut self) -> FeedPoll {
        match self.rx.try_recv() {
            Ok(message) => FeedPoll::Message(message),
            Err(TryRecvError::Empty) => FeedPoll::Empty,
            Err(TryRecvError::Disconnected) => FeedPoll::Closed,
        }
    }

    /// Wait for the next message; `None` once the sender is gone
    pub async fn next(&mut self) -> Option<FeedMessage> {
        self.rx.recv().await
    }
}

/// The subscribe-to-changes interface of the store
pub trait ChangeSource: Send + Sync {
    /// Open a feed for a collection
    fn subscribe(&self, collection: &str) -> CroupierResult<ChangeFeed>;

    /// Release a feed; unknown ids are ignored
    fn unsubscribe(&self, feed: FeedId);
}

impl<T: ChangeSource + ?Sized> ChangeSource for Arc<T> {
    fn subscribe(&self, collection: &str) -> CroupierResult<ChangeFeed> {
        (**self).subscribe(collection)
    }

    fn unsubscribe(&self, feed: FeedId) {
        (**self).unsubscribe(feed)
    }
}
