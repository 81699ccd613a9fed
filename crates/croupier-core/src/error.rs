//! Error types for Croupier

use thiserror::Error;

use crate::RecordId;

/// Coarse error classes used to decide between retrying and surfacing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, timeout, dropped feed
    Transport,
    /// Malformed input, never retried
    Validation,
    /// Rejected by the store
    Constraint,
    /// Subscription gave up reconnecting
    Exhausted,
    /// Bad configuration
    Config,
}

/// Core Croupier errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CroupierError {
    // Validation errors
    #[error("Collection name must not be empty")]
    EmptyCollectionName,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    // Store errors
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: RecordId },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // Subscription errors
    #[error("Subscription to {collection} gave up after {attempts} reconnect attempts: {last_error}")]
    RetriesExhausted {
        collection: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Subscription closed")]
    SubscriptionClosed,

    // Config errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CroupierError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CroupierError::EmptyCollectionName
            | CroupierError::InvalidRecord(_)
            | CroupierError::InvalidQuery(_)
            | CroupierError::UnknownCollection(_) => ErrorKind::Validation,
            CroupierError::NotFound { .. } | CroupierError::ConstraintViolation(_) => {
                ErrorKind::Constraint
            }
            CroupierError::TransportError(_)
            | CroupierError::ConnectionFailed(_)
            | CroupierError::SubscriptionClosed => ErrorKind::Transport,
            CroupierError::RetriesExhausted { .. } => ErrorKind::Exhausted,
            CroupierError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Transient errors may succeed when retried
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

/// Result type for Croupier operations
pub type CroupierResult<T> = Result<T, CroupierError>;
