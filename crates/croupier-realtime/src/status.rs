//! Connection status and per-subscription state

use std::fmt;
use std::time::Instant;

/// Connection status of a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionStatus {
    /// Allowed transitions. Close may interrupt any state.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Errored)
                | (Connecting, Disconnected)
                | (Connected, Errored)
                | (Connected, Disconnected)
                | (Errored, Connecting)
                | (Errored, Disconnected)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one subscription
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscriptionState {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    pub last_event_at: Option<Instant>,
    pub total_events_received: u64,
    pub connected_since: Option<Instant>,
}

impl SubscriptionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}
