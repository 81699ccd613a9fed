//! Croupier Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every Croupier crate:
//! - Identifiers (RecordId, SubscriptionHandle, FeedId)
//! - Records with their optional timestamps
//! - Change events delivered by collection subscriptions
//! - The error taxonomy

pub mod id;
pub mod record;
pub mod event;
pub mod error;

pub use id::*;
pub use record::*;
pub use event::*;
pub use error::*;
