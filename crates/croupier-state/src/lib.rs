//! Croupier State Engine - Change reconciliation into local state
//!
//! This crate implements the reconciliation side of realtime lists:
//! - Record field management (ordered, unique by id)
//! - Immediate delete bypass
//! - Last-write-wins coalescing within a batch
//! - Size-triggered and trailing-edge debounced flushes

pub mod field;
pub mod reconcile;

pub use field::*;
pub use reconcile::*;
