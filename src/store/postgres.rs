//! PostgreSQL-backed store using the JSON row builder.

use super::{Filters, Query, Store};
use crate::error::StoreError;
use crate::settings::Settings;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    /// Open a pool sized from settings.
    pub async fn connect(settings: &Settings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await?;
        Ok(PgStore::new(pool, settings.schema.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn fetch_rows(&self, q: &QueryBuf) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn fetch_optional_row(&self, q: &QueryBuf) -> Result<Option<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }
}

/// Ids are UUIDs in every table; anything else cannot match a row.
fn is_uuid(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let q = sql::select_list(&self.schema, table, query)?;
        self.fetch_rows(&q).await
    }

    async fn select_one(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let q = sql::select_by_id(&self.schema, table, id)?;
        self.fetch_optional_row(&q).await
    }

    async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, StoreError> {
        let q = sql::insert(&self.schema, table, &row)?;
        self.fetch_optional_row(&q)
            .await?
            .ok_or_else(|| StoreError::Database(format!("insert into {} returned no row", table)))
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let q = sql::update(&self.schema, table, id, &patch)?;
        self.fetch_optional_row(&q).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<Option<Value>, StoreError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let q = sql::delete(&self.schema, table, id)?;
        self.fetch_optional_row(&q).await
    }

    async fn count(&self, table: &str, filters: &Filters) -> Result<u64, StoreError> {
        let q = sql::count(&self.schema, table, filters)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}
