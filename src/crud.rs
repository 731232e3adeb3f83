//! Generic entity CRUD over one table: cached reads with bounded retry, invalidating writes.

use crate::cache::{CacheKey, QueryCache, ReadKind};
use crate::error::{AppError, StoreError};
use crate::schema::TableDef;
use crate::settings::Settings;
use crate::store::{Filters, Order, Query, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Retries applied to reads. Writes are never retried.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying transient store errors up to `max_retries` times.
    pub async fn run<T, F, Fut>(&self, table: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(table, attempt, error = %e, "transient read failure, retrying");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                other => return other,
            }
        }
    }
}

/// Store client, result cache and retry policy shared by every binding.
#[derive(Clone)]
pub struct DataContext {
    pub store: Arc<dyn Store>,
    pub cache: QueryCache,
    pub retry: RetryPolicy,
}

impl DataContext {
    pub fn new(store: Arc<dyn Store>, cache: QueryCache, retry: RetryPolicy) -> Self {
        DataContext { store, cache, retry }
    }

    pub fn from_settings(store: Arc<dyn Store>, settings: &Settings) -> Self {
        DataContext::new(
            store,
            QueryCache::new(settings.cache_ttl),
            RetryPolicy {
                max_retries: settings.read_retries,
                delay: settings.retry_delay,
            },
        )
    }

    /// Context with the default TTL and retry policy.
    pub fn with_defaults(store: Arc<dyn Store>) -> Self {
        DataContext::from_settings(store, &Settings::default())
    }

    /// Bind a typed CRUD to an explicit table name.
    pub fn table<T>(&self, table: impl Into<String>) -> EntityCrud<T> {
        EntityCrud::new(self.clone(), table)
    }

    /// Bind a typed CRUD to `{module}_{entity}`.
    pub fn module_table<T>(&self, module: &str, entity: &str) -> EntityCrud<T> {
        EntityCrud::new(self.clone(), table_name(module, entity))
    }

    /// Bind a registry table with its default sort, scoped to one tenant.
    pub fn bind<T>(&self, def: &TableDef, tenant_id: &str) -> EntityCrud<T> {
        self.table(def.name)
            .with_default_order(def.default_order())
            .for_tenant(tenant_id)
    }
}

/// Table identifier composed from a module and an entity name.
pub fn table_name(module: &str, entity: &str) -> String {
    format!("{}_{}", module, entity)
}

/// Serialize a create body or patch into a JSON object.
pub fn to_object<P: Serialize + ?Sized>(payload: &P) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(payload)? {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("payload must be a JSON object".into())),
    }
}

/// Typed CRUD bound to one table, optionally scoped to one tenant.
pub struct EntityCrud<T> {
    ctx: DataContext,
    table: String,
    default_order: Order,
    tenant_id: Option<String>,
    _row: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCrud<T> {
    fn clone(&self) -> Self {
        EntityCrud {
            ctx: self.ctx.clone(),
            table: self.table.clone(),
            default_order: self.default_order.clone(),
            tenant_id: self.tenant_id.clone(),
            _row: PhantomData,
        }
    }
}

impl<T> EntityCrud<T> {
    pub fn new(ctx: DataContext, table: impl Into<String>) -> Self {
        EntityCrud {
            ctx,
            table: table.into(),
            default_order: Order::default(),
            tenant_id: None,
            _row: PhantomData,
        }
    }

    pub fn with_default_order(mut self, order: Order) -> Self {
        self.default_order = order;
        self
    }

    /// Scope list/stats to `tenant_id` and stamp it on created rows.
    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn default_order(&self) -> &Order {
        &self.default_order
    }

    /// Drop cached results for this table; the next read goes to the store.
    pub fn invalidate(&self) {
        self.ctx.cache.invalidate_table(&self.table);
    }

    fn scoped(&self, filters: &Filters) -> Filters {
        let mut f = filters.clone();
        if let Some(t) = &self.tenant_id {
            f.insert("tenant_id", Value::String(t.clone()));
        }
        f
    }

    async fn cached_read<F, Fut>(&self, kind: ReadKind, request: String, op: F) -> Result<Value, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, StoreError>>,
    {
        let key = CacheKey::new(self.table.clone(), kind, request);
        let retry = self.ctx.retry;
        let table = self.table.as_str();
        let value = self
            .ctx
            .cache
            .get_or_fetch(key, || async move { retry.run(table, op).await })
            .await?;
        Ok(value)
    }
}

impl<T: DeserializeOwned> EntityCrud<T> {
    /// Rows matching every filter, ordered by `order` or the binding's default.
    pub async fn list(&self, filters: &Filters, order: Option<&Order>) -> Result<Vec<T>, AppError> {
        self.list_page(filters, order, None, None).await
    }

    /// `list` with paging.
    pub async fn list_page(
        &self,
        filters: &Filters,
        order: Option<&Order>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<T>, AppError> {
        let query = Query {
            filters: self.scoped(filters),
            order: order.cloned().unwrap_or_else(|| self.default_order.clone()),
            limit,
            offset,
        };
        let request = serde_json::to_string(&query)?;
        let store = self.ctx.store.clone();
        let table = self.table.clone();
        let value = self
            .cached_read(ReadKind::List, request, || {
                let store = store.clone();
                let table = table.clone();
                let query = query.clone();
                async move { store.select(&table, &query).await.map(Value::Array) }
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Row by id, or `None` when absent.
    pub async fn get_one(&self, id: &str) -> Result<Option<T>, AppError> {
        let store = self.ctx.store.clone();
        let table = self.table.clone();
        let id_owned = id.to_string();
        let value = self
            .cached_read(ReadKind::One, id.to_string(), || {
                let store = store.clone();
                let table = table.clone();
                let id = id_owned.clone();
                async move { store.select_one(&table, &id).await.map(|r| r.unwrap_or(Value::Null)) }
            })
            .await?;
        match value {
            Value::Null => Ok(None),
            v => Ok(Some(serde_json::from_value(v)?)),
        }
    }

    /// Number of rows matching the filters.
    pub async fn stats(&self, filters: &Filters) -> Result<u64, AppError> {
        let filters = self.scoped(filters);
        let request = serde_json::to_string(&filters)?;
        let store = self.ctx.store.clone();
        let table = self.table.clone();
        let value = self
            .cached_read(ReadKind::Count, request, || {
                let store = store.clone();
                let table = table.clone();
                let filters = filters.clone();
                async move { store.count(&table, &filters).await.map(Value::from) }
            })
            .await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    /// Insert one row and return it as stored.
    pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> Result<T, AppError> {
        let mut row = to_object(payload)?;
        if let Some(t) = &self.tenant_id {
            row.entry("tenant_id").or_insert_with(|| Value::String(t.clone()));
        }
        let stored = self.ctx.store.insert(&self.table, row).await?;
        self.invalidate();
        tracing::debug!(table = %self.table, id = ?stored.get("id"), "row created");
        Ok(serde_json::from_value(stored)?)
    }

    /// Patch one row. A missing row is `NotFound`.
    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Result<T, AppError> {
        let patch = to_object(patch)?;
        let updated = self
            .ctx
            .store
            .update(&self.table, id, patch)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.table, id)))?;
        self.invalidate();
        Ok(serde_json::from_value(updated)?)
    }

    /// Remove one row. Removing an absent row succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let removed = self.ctx.store.delete(&self.table, id).await?;
        if removed.is_none() {
            tracing::debug!(table = %self.table, id, "delete matched no row");
        }
        self.invalidate();
        Ok(())
    }
}
