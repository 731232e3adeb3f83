//! Idempotent DDL for the table registry, plus database bootstrap.
//!
//! Every table gets the envelope columns and an index on `tenant_id`. Columns
//! added to a registry table later are added in place with `ADD COLUMN IF NOT EXISTS`.

use crate::error::{AppError, ConfigError, StoreError};
use crate::schema::{all_tables, TableDef, ENVELOPE_COLUMNS};
use crate::sql::{qualified_table, quoted};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

fn column_sql(name: &str, pg_type: &str, default: Option<&str>) -> Result<String, StoreError> {
    let mut def = format!("{} {}", quoted(name)?, pg_type);
    if let Some(d) = default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    Ok(def)
}

/// `CREATE TABLE IF NOT EXISTS` with envelope columns first.
pub fn create_table_sql(schema: &str, def: &TableDef) -> Result<String, StoreError> {
    let mut cols = Vec::with_capacity(ENVELOPE_COLUMNS.len() + def.columns.len());
    for (name, decl) in ENVELOPE_COLUMNS {
        cols.push(format!("{} {}", quoted(name)?, decl));
    }
    for c in def.columns {
        cols.push(column_sql(c.name, c.pg_type, c.default)?);
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(schema, def.name)?,
        cols.join(",\n  ")
    ))
}

/// Statements run after the table exists: late columns and the tenant index.
pub fn follow_up_sql(schema: &str, def: &TableDef) -> Result<Vec<String>, StoreError> {
    let target = qualified_table(schema, def.name)?;
    let mut stmts = Vec::with_capacity(def.columns.len() + 1);
    for c in def.columns {
        stmts.push(format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
            target,
            column_sql(c.name, c.pg_type, c.default)?
        ));
    }
    stmts.push(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quoted(&format!("{}_tenant_id_idx", def.name))?,
        target,
        quoted("tenant_id")?
    ));
    Ok(stmts)
}

/// Create the schema and every registry table that does not exist yet.
pub async fn ensure_tables(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)?))
        .execute(pool)
        .await
        .map_err(StoreError::from)?;
    let mut n = 0;
    for def in all_tables() {
        let create = create_table_sql(schema, def)?;
        tracing::debug!(table = def.name, "ensuring table");
        sqlx::query(&create).execute(pool).await.map_err(StoreError::from)?;
        for stmt in follow_up_sql(schema, def)? {
            sqlx::query(&stmt).execute(pool).await.map_err(StoreError::from)?;
        }
        n += 1;
    }
    tracing::info!(schema, tables = n, "registry tables ensured");
    Ok(())
}

/// Connect to the server's `postgres` database and create the target database when missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = split_database_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url).map_err(|e| {
        AppError::Config(ConfigError::InvalidValue {
            key: "DATABASE_URL",
            value: e.to_string(),
        })
    })?;
    let mut conn = opts.connect().await.map_err(StoreError::from)?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(StoreError::from)?;
    if !exists {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)?))
            .execute(&mut conn)
            .await
            .map_err(StoreError::from)?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

/// Split `postgres://host/db?opts` into the admin URL (`.../postgres`) and `db`.
fn split_database_url(url: &str) -> Result<(String, String), AppError> {
    let invalid = || {
        AppError::Config(ConfigError::InvalidValue {
            key: "DATABASE_URL",
            value: url.to_string(),
        })
    };
    let scheme_end = url.find("://").ok_or_else(invalid)? + 3;
    let slash = url[scheme_end..].find('/').map(|i| i + scheme_end).ok_or_else(invalid)?;
    let rest = &url[slash + 1..];
    let (db_name, query) = match rest.split_once('?') {
        Some((d, q)) => (d, Some(q)),
        None => (rest, None),
    };
    let mut admin = format!("{}/postgres", &url[..slash]);
    if let Some(q) = query {
        admin.push('?');
        admin.push_str(q);
    }
    Ok((admin, db_name.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::saude;

    #[test]
    fn create_table_includes_envelope_and_defaults() {
        let sql = create_table_sql("public", &saude::PACIENTES).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"saude_pacientes\" ("));
        assert!(sql.contains("\"id\" UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(sql.contains("\"tenant_id\" TEXT"));
        assert!(sql.contains("\"status\" TEXT DEFAULT 'ativo'"));
        assert!(sql.contains("\"endereco\" JSONB"));
    }

    #[test]
    fn follow_up_adds_columns_and_tenant_index() {
        let stmts = follow_up_sql("app", &saude::UNIDADES).unwrap();
        assert_eq!(stmts.len(), saude::UNIDADES.columns.len() + 1);
        assert_eq!(
            stmts[0],
            "ALTER TABLE \"app\".\"saude_unidades\" ADD COLUMN IF NOT EXISTS \"nome\" TEXT"
        );
        assert_eq!(
            stmts.last().unwrap(),
            "CREATE INDEX IF NOT EXISTS \"saude_unidades_tenant_id_idx\" ON \"app\".\"saude_unidades\" (\"tenant_id\")"
        );
    }

    #[test]
    fn every_registry_table_renders() {
        for def in all_tables() {
            assert!(create_table_sql("public", def).is_ok(), "{}", def.name);
        }
        assert!(create_table_sql("bad schema", &saude::PACIENTES).is_err());
    }

    #[test]
    fn database_url_is_split_into_admin_and_name() {
        let (admin, db) = split_database_url("postgres://u:p@localhost:5432/digiurban?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres?sslmode=disable");
        assert_eq!(db, "digiurban");
        let (_, db) = split_database_url("postgres://localhost").unwrap_or_default();
        assert_eq!(db, "");
    }
}
