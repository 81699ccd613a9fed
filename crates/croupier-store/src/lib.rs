//! Croupier Store - the data store collaborator
//!
//! This crate provides:
//! - Query shapes (filters, search, sort, page range)
//! - The `DataStore` query/mutation contract
//! - The `ChangeSource` change-feed contract
//! - Identity lookup for audit tagging
//! - `MemoryStore`, an in-process implementation with failure injection

pub mod query;
pub mod source;
pub mod store;
pub mod auth;
pub mod memory;

pub use query::*;
pub use source::*;
pub use store::*;
pub use auth::*;
pub use memory::{MemoryStore, Operation};
