//! Query result cache: TTL entries keyed by table and request, with per-table invalidation
//! and de-duplication of concurrent identical reads.

use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Kind of read a cached value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadKind {
    List,
    One,
    Count,
}

/// Identity of a cached read: the table plus a canonical rendering of the request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub table: String,
    pub kind: ReadKind,
    pub request: String,
}

impl CacheKey {
    pub fn new(table: impl Into<String>, kind: ReadKind, request: impl Into<String>) -> Self {
        CacheKey {
            table: table.into(),
            kind,
            request: request.into(),
        }
    }
}

/// Shared cache owned by a `DataContext`. Clones share entries.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<DashMap<CacheKey, (Value, Instant)>>,
    gates: Arc<DashMap<CacheKey, Arc<Mutex<()>>>>,
    generations: Arc<DashMap<String, Arc<AtomicU64>>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        QueryCache {
            entries: Arc::new(DashMap::new()),
            gates: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached value, if any. Expired entries are dropped on access.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            let (val, inserted) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(val.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, (value, Instant::now()));
    }

    /// Drop every entry for `table` and bump its generation so in-flight reads don't repopulate it.
    pub fn invalidate_table(&self, table: &str) {
        self.generation_counter(table).fetch_add(1, Ordering::SeqCst);
        self.entries.retain(|k, _| k.table != table);
        self.gates.retain(|k, _| k.table != table);
        tracing::debug!(table, "cache invalidated");
    }

    /// Drop every entry older than the TTL, whatever its key.
    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn generation_counter(&self, table: &str) -> Arc<AtomicU64> {
        self.generations
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    /// Return the cached value for `key`, or run `fetch` once and cache its success.
    ///
    /// Concurrent callers with the same key queue behind one gate; the followers find the
    /// leader's result in the cache instead of calling `fetch` again. Errors are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(v) = self.get(&key) {
            tracing::debug!(table = %key.table, kind = ?key.kind, "cache hit");
            return Ok(v);
        }
        let gate = self
            .gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;
        if let Some(v) = self.get(&key) {
            tracing::debug!(table = %key.table, kind = ?key.kind, "cache hit after wait");
            return Ok(v);
        }
        tracing::debug!(table = %key.table, kind = ?key.kind, "cache miss");
        self.evict_expired();
        let counter = self.generation_counter(&key.table);
        let generation = counter.load(Ordering::SeqCst);
        let fetched = fetch().await;
        if let Ok(value) = &fetched {
            if counter.load(Ordering::SeqCst) == generation {
                self.insert(key.clone(), value.clone());
            }
        }
        // Waiters already hold a clone of the gate; later callers hit the entry.
        self.gates.remove_if(&key, |_, g| Arc::ptr_eq(g, &gate));
        fetched
    }

    /// Number of per-key gates held for reads in flight.
    pub fn pending_gates(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn key(table: &str, req: &str) -> CacheKey {
        CacheKey::new(table, ReadKind::List, req)
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        tokio::time::pause();
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.insert(key("a", "q"), json!(1));
        assert_eq!(cache.get(&key("a", "q")), Some(json!(1)));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&key("a", "q")), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn misses_sweep_entries_of_other_keys_after_ttl() {
        tokio::time::pause();
        let cache = QueryCache::new(Duration::from_secs(1));
        for i in 0..200 {
            let r: Result<Value, ()> = cache
                .get_or_fetch(key("t", &format!("offset={}", i)), || async move { Ok(json!(i)) })
                .await;
            assert!(r.is_ok());
        }
        assert_eq!(cache.len(), 200);
        assert_eq!(cache.pending_gates(), 0);

        tokio::time::advance(Duration::from_secs(3600)).await;
        for i in 0..10 {
            let r: Result<Value, ()> = cache
                .get_or_fetch(key("t", &format!("fresh={}", i)), || async move { Ok(json!(i)) })
                .await;
            assert!(r.is_ok());
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.pending_gates(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_releases_its_gate() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let r: Result<Value, &str> = cache.get_or_fetch(key("t", "q"), || async { Err("down") }).await;
        assert!(r.is_err());
        assert_eq!(cache.pending_gates(), 0);
    }

    #[tokio::test]
    async fn invalidation_is_per_table() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.insert(key("a", "1"), json!(1));
        cache.insert(key("a", "2"), json!(2));
        cache.insert(key("b", "1"), json!(3));
        cache.invalidate_table("a");
        assert_eq!(cache.get(&key("a", "1")), None);
        assert_eq!(cache.get(&key("a", "2")), None);
        assert_eq!(cache.get(&key("b", "1")), Some(json!(3)));
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = || {
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, ()>(json!(["row"]))
            }
        };
        let (a, b) = tokio::join!(
            cache.get_or_fetch(key("t", "q"), fetch()),
            cache.get_or_fetch(key("t", "q"), fetch())
        );
        assert_eq!(a, Ok(json!(["row"])));
        assert_eq!(b, Ok(json!(["row"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let r: Result<Value, &str> = cache.get_or_fetch(key("t", "q"), || async { Err("down") }).await;
        assert!(r.is_err());
        let r: Result<Value, &str> = cache.get_or_fetch(key("t", "q"), || async { Ok(json!(2)) }).await;
        assert_eq!(r, Ok(json!(2)));
    }

    #[tokio::test]
    async fn read_racing_an_invalidation_is_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let c = cache.clone();
        let v: Result<Value, ()> = cache
            .get_or_fetch(key("t", "q"), || async move {
                c.invalidate_table("t");
                Ok(json!("stale"))
            })
            .await;
        assert_eq!(v, Ok(json!("stale")));
        assert_eq!(cache.get(&key("t", "q")), None);
    }
}
