//! Croupier Realtime - Change subscription management
//!
//! This crate keeps collection change feeds alive:
//! - Connection status tracking (Connecting/Connected/Errored/Disconnected)
//! - Exponential-backoff reconnection with a retry cap
//! - Pause/resume for hosts that suspend in the background
//! - Connection quality telemetry
//! - A registry holding one subscription per collection
//!
//! Everything is driven by `poll(now)` on a single logical thread; no
//! timers or tasks are spawned here.

pub mod backoff;
pub mod status;
pub mod quality;
pub mod subscription;
pub mod manager;

pub use backoff::*;
pub use status::*;
pub use quality::*;
pub use subscription::*;
pub use manager::*;
