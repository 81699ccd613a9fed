//! Connection quality telemetry

use std::time::{Duration, Instant};

use crate::{ConnectionStatus, SubscriptionState};

/// Coarse health grade
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Health {
    /// Connected without ever having to reconnect
    Excellent,
    /// Connected after at least one reconnect
    Good,
    /// Connecting or waiting to retry
    Degraded,
    /// Closed, paused or out of retries
    Offline,
}

/// Snapshot of a subscription's connection quality
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionQuality {
    pub status: ConnectionStatus,
    pub health: Health,
    /// Time since the current connection was established
    pub uptime: Option<Duration>,
    pub total_events: u64,
    /// Time since the last change event
    pub last_event_age: Option<Duration>,
    pub reconnect_attempts: u32,
}

impl ConnectionQuality {
    /// Measure the state at `now`
    pub fn measure(
        state: &SubscriptionState,
        reconnects: u64,
        exhausted: bool,
        now: Instant,
    ) -> Self {
        let health = match state.status {
            ConnectionStatus::Connected if reconnects == 0 => Health::Excellent,
            ConnectionStatus::Connected => Health::Good,
            ConnectionStatus::Errored if exhausted => Health::Offline,
            ConnectionStatus::Connecting | ConnectionStatus::Errored => Health::Degraded,
            ConnectionStatus::Disconnected => Health::Offline,
        };

        ConnectionQuality {
            status: state.status,
            health,
            uptime: state
                .connected_since
                .map(|since| now.saturating_duration_since(since)),
            total_events: state.total_events_received,
            last_event_age: state
                .last_event_at
                .map(|at| now.saturating_duration_since(at)),
            reconnect_attempts: state.reconnect_attempts,
        }
    }
}
