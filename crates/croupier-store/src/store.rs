//! Query and mutation contract of the data store
//!
//! Every call is one network round trip on a hosted store. Each mutation is
//! atomic on the server; nothing here spans multiple calls.

use croupier_core::{CroupierResult, Fields, Record, RecordId};

use crate::{ChangeSource, Page, Query};

/// Request/response half of the data store
#[allow(async_fn_in_trait)]
pub trait DataStore: ChangeSource {
    /// Filtered, sorted, windowed read with the total matching count
    async fn select(&self, collection: &str, query: &Query) -> CroupierResult<Page>;

    /// Insert a record; the store assigns an id when `data` has none
    async fn insert(&self, collection: &str, data: Fields) -> CroupierResult<Record>;

    /// Patch an existing record
    async fn update(&self, collection: &str, id: &RecordId, patch: Fields)
        -> CroupierResult<Record>;

    /// Delete one or more records, all or nothing
    async fn delete(&self, collection: &str, ids: &[RecordId]) -> CroupierResult<()>;
}
