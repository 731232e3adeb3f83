//! Remote store abstraction: row-level access to tables as JSON objects.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Equality filters ANDed together. Keys are kept sorted so equal filter sets hash the same.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Filters(BTreeMap<String, FilterValue>);

/// Wrapper giving JSON filter values a stable textual identity for hashing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterValue(String);

impl FilterValue {
    pub fn value(&self) -> Value {
        serde_json::from_str(&self.0).unwrap_or(Value::Null)
    }
}

impl Serialize for FilterValue {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(s)
    }
}

impl Filters {
    pub fn new() -> Self {
        Filters(BTreeMap::new())
    }

    /// Add `column = value`. Null and empty-string values are skipped, not matched.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value.into());
        self
    }

    /// Add `column = value` when a value is present.
    pub fn eq_opt<V: Into<Value>>(self, column: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let skip = match &value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if !skip {
            self.0.insert(column.into(), FilterValue(value.to_string()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.value()))
    }

    /// True when every filter equals the row's field.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.iter()
            .all(|(col, expected)| row.get(col).map(|v| json_eq(v, &expected)).unwrap_or(false))
    }
}

impl FromIterator<(String, Value)> for Filters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut f = Filters::new();
        for (k, v) in iter {
            f.insert(k, v);
        }
        f
    }
}

/// Sort column and direction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Order {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Order {
            column: column.into(),
            ascending: false,
        }
    }

    /// Parse `column`, `column.asc` or `column.desc`.
    pub fn parse(s: &str) -> Option<Self> {
        let (col, dir) = match s.rsplit_once('.') {
            Some((c, d)) => (c, d),
            None => (s, "asc"),
        };
        if col.is_empty() {
            return None;
        }
        match dir.to_ascii_lowercase().as_str() {
            "asc" => Some(Order::asc(col)),
            "desc" => Some(Order::desc(col)),
            _ => None,
        }
    }
}

impl Default for Order {
    fn default() -> Self {
        Order::desc("created_at")
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.column, if self.ascending { "asc" } else { "desc" })
    }
}

/// One read request: filters, ordering and optional paging.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    pub filters: Filters,
    pub order: Order,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Row-level access to the remote store. Rows travel as JSON objects.
///
/// Implementations assign `created_at` and `updated_at` on insert, whatever the row carries.
/// `id` is generated when the row has none.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Fetch by primary key. Absent rows are `Ok(None)`.
    async fn select_one(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, StoreError>;

    /// Patch by primary key. Returns the updated row, or `None` when no row matched.
    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    /// Delete by primary key. Returns the removed row, if any.
    async fn delete(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn count(&self, table: &str, filters: &Filters) -> Result<u64, StoreError>;

    /// Cheap round-trip used by readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// JSON equality where numbers compare by value (`100` equals `100.0`).
pub(crate) fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
