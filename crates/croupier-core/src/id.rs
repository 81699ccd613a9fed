//! Identity types for Croupier
//!
//! Record ids are opaque strings assigned by the data store. Handles and
//! feed ids are local 64-bit counters that never leave the process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Record identity - the only field the core interprets
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId(id)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription handle - returned by the subscription registry
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscriptionHandle(pub u64);

impl SubscriptionHandle {
    #[inline]
    pub fn new(id: u64) -> Self {
        SubscriptionHandle(id)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription({})", self.0)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Feed identity - one backend change feed, assigned by the change source
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeedId(pub u64);

impl FeedId {
    #[inline]
    pub fn new(id: u64) -> Self {
        FeedId(id)
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feed({:08x})", self.0)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display_and_debug() {
        let id = RecordId::from("casino-7");
        assert_eq!(id.to_string(), "casino-7");
        assert_eq!(format!("{:?}", id), "Record(casino-7)");
        assert!(!id.is_empty());
    }

    #[test]
    fn test_record_id_serializes_as_plain_string() {
        let id = RecordId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: RecordId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_handle_formatting() {
        assert_eq!(SubscriptionHandle::new(3).to_string(), "sub-3");
        assert_eq!(format!("{:?}", FeedId::new(255)), "Feed(000000ff)");
    }
}
