//! Croupier Runtime - Collection views over a data store
//!
//! This crate ties the lower layers together:
//! - `CollectionView`: query/filter/sort/paginate/select/mutate over one collection
//! - Optional realtime mode (subscription + batching reconciler)
//! - Audit and notification collaborators
//! - Runtime configuration and logging setup
//! - A tokio driver loop for realtime views

pub mod audit;
pub mod config;
pub mod context;
pub mod driver;
pub mod logging;
pub mod notify;
pub mod view;

pub use audit::*;
pub use config::*;
pub use context::*;
pub use driver::*;
pub use notify::*;
pub use view::*;
