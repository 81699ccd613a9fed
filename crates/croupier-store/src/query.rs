//! Query shapes understood by every data store

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use croupier_core::{CroupierError, CroupierResult, Record};

/// Equality filters, field -> value
pub type Filters = BTreeMap<String, Value>;

/// Sort direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

/// Case-insensitive substring search over a set of text fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Search {
    pub term: String,
    pub fields: Vec<String>,
}

impl Search {
    /// Does any searched field contain the term?
    pub fn matches(&self, record: &Record) -> bool {
        let needle = self.term.to_lowercase();
        self.fields.iter().any(|field| {
            matches!(record.get(field), Some(Value::String(s)) if s.to_lowercase().contains(&needle))
        })
    }
}

/// A select request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filters: Filters,
    pub search: Option<Search>,
    pub sort: Option<Sort>,
    /// Inclusive row window `[start, end]`
    pub range: Option<(usize, usize)>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>, fields: Vec<String>) -> Self {
        self.search = Some(Search {
            term: term.into(),
            fields,
        });
        self
    }

    pub fn sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }

    /// Reject malformed queries before they reach the store
    pub fn validate(&self) -> CroupierResult<()> {
        if let Some((start, end)) = self.range {
            if start > end {
                return Err(CroupierError::InvalidQuery(format!(
                    "range start {} is after end {}",
                    start, end
                )));
            }
        }
        if let Some(sort) = &self.sort {
            if sort.column.trim().is_empty() {
                return Err(CroupierError::InvalidQuery("empty sort column".to_string()));
            }
        }
        if self.filters.keys().any(|k| k.trim().is_empty()) {
            return Err(CroupierError::InvalidQuery("empty filter field".to_string()));
        }
        Ok(())
    }

    /// Does a record pass the filters and search term?
    pub fn matches(&self, record: &Record) -> bool {
        let filtered = self
            .filters
            .iter()
            .all(|(field, expected)| record.get(field).as_ref() == Some(expected));
        filtered && self.search.as_ref().map_or(true, |s| s.matches(record))
    }
}

/// One page of results
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// Count of all matching rows, not just this page
    pub total_count: usize,
}

/// Total order over JSON values used for sorting.
/// Missing and null sort first, then bools, numbers, strings, everything else.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_validation() {
        assert!(Query::new().range(0, 9).validate().is_ok());
        assert!(matches!(
            Query::new().range(10, 9).validate(),
            Err(CroupierError::InvalidQuery(_))
        ));
        assert!(Query::new()
            .sort(" ", SortDirection::Asc)
            .validate()
            .is_err());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let record = Record::new("1").with_field("name", "Royal Vegas");
        let query = Query::new().search("VEGAS", vec!["name".into(), "slug".into()]);
        assert!(query.matches(&record));

        let query = Query::new().search("macau", vec!["name".into()]);
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_filters_require_equality() {
        let record = Record::new("1")
            .with_field("status", "published")
            .with_field("featured", true);
        assert!(Query::new().filter("status", "published").matches(&record));
        assert!(!Query::new().filter("featured", false).matches(&record));
        assert!(!Query::new().filter("missing", "x").matches(&record));
    }

    #[test]
    fn test_compare_values_orders_mixed_types() {
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(None, Some(&json!("a"))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_sort_direction_flip() {
        assert_eq!(SortDirection::default(), SortDirection::Desc);
        assert_eq!(SortDirection::Asc.flip(), SortDirection::Desc);
    }
}
