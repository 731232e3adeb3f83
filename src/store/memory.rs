//! In-process store with the same row semantics as `PgStore`. Used by tests and local demos.

use super::{Filters, Query, Store};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

type Tables = HashMap<String, Vec<Map<String, Value>>>;

/// Thread-safe in-memory tables keyed by name. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    failing_reads: Arc<AtomicUsize>,
    failing_writes: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Delay every call by `latency`, to make overlapping requests observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of read calls (`select`, `select_one`, `count`) that reached the store.
    pub fn read_count(&self) -> usize {
        self.reads.load(AtomicOrdering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Make the next `n` reads fail with a transport error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, AtomicOrdering::SeqCst);
    }

    /// Make the next `n` writes fail with a transport error.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, AtomicOrdering::SeqCst);
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .map(|t| {
                t.get(table)
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    async fn begin(&self, counter: &AtomicUsize, failing: &AtomicUsize) -> Result<(), StoreError> {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        counter.fetch_add(1, AtomicOrdering::SeqCst);
        let failed = failing
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Transport("injected failure".into()));
        }
        Ok(())
    }

    async fn begin_read(&self) -> Result<(), StoreError> {
        self.begin(&self.reads, &self.failing_reads).await
    }

    async fn begin_write(&self) -> Result<(), StoreError> {
        self.begin(&self.writes, &self.failing_writes).await
    }

    fn read_tables<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StoreError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))?;
        Ok(f(&guard))
    }

    fn write_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R, StoreError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn id_of(row: &Map<String, Value>) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Ordering used for ORDER BY: nulls sort last ascending (and so first descending), like PostgreSQL.
fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.begin_read().await?;
        self.read_tables(|tables| {
            let mut rows: Vec<&Map<String, Value>> = tables
                .get(table)
                .map(|rows| rows.iter().filter(|r| query.filters.matches(r)).collect())
                .unwrap_or_default();
            let col = query.order.column.as_str();
            rows.sort_by(|a, b| {
                let ord = compare_json(a.get(col), b.get(col));
                if query.order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
            let offset = query.offset.unwrap_or(0) as usize;
            let limit = query
                .limit
                .map(|n| n.min(crate::sql::MAX_LIMIT) as usize)
                .unwrap_or(usize::MAX);
            rows.into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .map(Value::Object)
                .collect()
        })
    }

    async fn select_one(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.begin_read().await?;
        self.read_tables(|tables| {
            tables
                .get(table)
                .and_then(|rows| rows.iter().find(|r| id_of(r) == Some(id)))
                .cloned()
                .map(Value::Object)
        })
    }

    async fn insert(&self, table: &str, mut row: Map<String, Value>) -> Result<Value, StoreError> {
        self.begin_write().await?;
        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        row.insert("id".into(), Value::String(id.clone()));
        let ts = now();
        row.insert("created_at".into(), ts.clone());
        row.insert("updated_at".into(), ts);
        self.write_tables(|tables| {
            let rows = tables.entry(table.to_string()).or_default();
            if rows.iter().any(|r| id_of(r) == Some(id.as_str())) {
                return Err(StoreError::Constraint(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table
                )));
            }
            rows.push(row.clone());
            Ok(Value::Object(row))
        })?
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        self.begin_write().await?;
        self.write_tables(|tables| {
            let row = tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|r| id_of(r) == Some(id)));
            let Some(row) = row else { return None };
            for (k, v) in patch {
                if matches!(k.as_str(), "id" | "created_at" | "updated_at") {
                    continue;
                }
                row.insert(k, v);
            }
            row.insert("updated_at".into(), now());
            Some(Value::Object(row.clone()))
        })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.begin_write().await?;
        self.write_tables(|tables| {
            let rows = tables.get_mut(table)?;
            let pos = rows.iter().position(|r| id_of(r) == Some(id))?;
            Some(Value::Object(rows.remove(pos)))
        })
    }

    async fn count(&self, table: &str, filters: &Filters) -> Result<u64, StoreError> {
        self.begin_read().await?;
        self.read_tables(|tables| {
            tables
                .get(table)
                .map(|rows| rows.iter().filter(|r| filters.matches(r)).count() as u64)
                .unwrap_or(0)
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
