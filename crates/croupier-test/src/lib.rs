//! Croupier Test Harness - Fixtures, change storms and end-to-end scenarios
//!
//! This crate provides:
//! - Casino/news fixtures seeded into a `MemoryStore`
//! - Seeded change storms (insert/update/delete bursts, feed drops)
//! - A realtime convergence harness driving a `CollectionView`
//! - End-to-end list scenarios

pub mod fixtures;
pub mod chaos;
pub mod integration;

pub use fixtures::*;
pub use chaos::*;
pub use integration::*;
