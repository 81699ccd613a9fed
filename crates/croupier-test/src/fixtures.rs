//! Record fixtures

use std::sync::Arc;

use serde_json::Value;

use croupier_core::{Fields, Record};
use croupier_store::MemoryStore;

pub const CASINOS: &str = "casinos";
pub const NEWS: &str = "news";

const NAMES: [&str; 8] = [
    "Aurora", "Blackjack Bay", "Crown Royale", "Diamond Den", "Emerald Palace", "Fortune Falls",
    "Golden Ace", "High Roller",
];

/// Deterministic casino row `i`
pub fn casino(i: usize) -> Record {
    let status = if i % 3 == 0 { "draft" } else { "published" };
    Record::new(format!("casino-{:03}", i))
        .with_field("name", format!("{} {:03}", NAMES[i % NAMES.len()], i))
        .with_field("rating", (i % 5 + 1) as i64)
        .with_field("status", status)
        .with_field("bonus", format!("{}% up to ${}", 100 + (i % 4) * 50, 200 + i * 10))
}

pub fn news_item(i: usize) -> Record {
    Record::new(format!("news-{:03}", i))
        .with_field("title", format!("Industry update #{}", i))
        .with_field("status", "published")
}

/// Store with `casinos` rows `0..casinos` and `news` rows `0..news`
pub fn seeded_store(casinos: usize, news: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_collection(CASINOS);
    store.create_collection(NEWS);
    store.seed(CASINOS, (0..casinos).map(casino));
    store.seed(NEWS, (0..news).map(news_item));
    store
}

/// Object-literal helper for create/update payloads
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}
