//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and COUNT over JSON rows.
//!
//! Rows are read with `to_jsonb(t)` and written through `jsonb_populate_record`, so the
//! builder needs no column metadata: column types come from the table itself.

use crate::error::StoreError;
use crate::store::{Filters, Query};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Alias used for the target table in every statement.
const ROW_ALIAS: &str = "t";

/// Hard cap on page size, whatever the caller asks for.
pub const MAX_LIMIT: u32 = 1000;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static regex"))
}

/// True for plain PostgreSQL identifiers (letters, digits, underscore; max 63 chars).
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

/// Quote identifier for PostgreSQL after checking it.
pub fn quoted(s: &str) -> Result<String, StoreError> {
    if !is_identifier(s) {
        return Err(StoreError::InvalidQuery(format!("invalid identifier: {:?}", s)));
    }
    Ok(format!("\"{}\"", s))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> Result<String, StoreError> {
    Ok(format!("{}.{}", quoted(schema)?, quoted(table)?))
}

/// SQL text plus its positional parameters. Every parameter is bound as text and cast in SQL.
#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<String>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: String) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn where_clause(q: &mut QueryBuf, filters: &Filters) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(filters.len());
    for (col, val) in filters.iter() {
        let n = q.push_param(val.to_string());
        parts.push(format!("to_jsonb({}.{}) = ${}::jsonb", ROW_ALIAS, quoted(col)?, n));
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// SELECT rows as JSON with equality filters, ORDER BY and optional LIMIT/OFFSET.
pub fn select_list(schema: &str, table: &str, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let filter_sql = where_clause(&mut q, &query.filters)?;
    let direction = if query.order.ascending { "ASC" } else { "DESC" };
    let order_clause = format!(
        " ORDER BY {}.{} {}",
        ROW_ALIAS,
        quoted(&query.order.column)?,
        direction
    );
    let limit_clause = query
        .limit
        .map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT)))
        .unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} {a}{}{}{}{}",
        target,
        filter_sql,
        order_clause,
        limit_clause,
        offset_clause,
        a = ROW_ALIAS
    );
    Ok(q)
}

/// SELECT one row by `id`. Caller binds nothing else.
pub fn select_by_id(schema: &str, table: &str, id: &str) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let n = q.push_param(id.to_string());
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} {a} WHERE {a}.\"id\" = ${}::uuid",
        target,
        n,
        a = ROW_ALIAS
    );
    Ok(q)
}

/// COUNT(*) with equality filters.
pub fn count(schema: &str, table: &str, filters: &Filters) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let filter_sql = where_clause(&mut q, filters)?;
    q.sql = format!("SELECT COUNT(*) FROM {} {}{}", target, ROW_ALIAS, filter_sql);
    Ok(q)
}

/// INSERT only the columns present in `row`; omitted columns take their DB default.
/// Timestamps always come from the database.
pub fn insert(schema: &str, table: &str, row: &Map<String, Value>) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let row: Map<String, Value> = row
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "created_at" | "updated_at"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if row.is_empty() {
        q.sql = format!(
            "INSERT INTO {} AS {a} DEFAULT VALUES RETURNING to_jsonb({a})",
            target,
            a = ROW_ALIAS
        );
        return Ok(q);
    }
    let cols = row
        .keys()
        .map(|k| quoted(k))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let n = q.push_param(Value::Object(row).to_string());
    q.sql = format!(
        "INSERT INTO {target} AS {a} ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{target}, ${n}::jsonb) RETURNING to_jsonb({a})",
        target = target,
        cols = cols,
        n = n,
        a = ROW_ALIAS
    );
    Ok(q)
}

/// UPDATE by id: SET only columns present in the patch, always bumping `updated_at`.
/// `id` and `created_at` are never written.
pub fn update(
    schema: &str,
    table: &str,
    id: &str,
    patch: &Map<String, Value>,
) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let writable: Map<String, Value> = patch
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "id" | "created_at" | "updated_at"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut sets = Vec::new();
    if !writable.is_empty() {
        let cols = writable
            .keys()
            .map(|k| quoted(k))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let n = q.push_param(Value::Object(writable).to_string());
        sets.push(format!(
            "({cols}) = (SELECT {cols} FROM jsonb_populate_record(NULL::{target}, ${n}::jsonb))",
            cols = cols,
            target = target,
            n = n
        ));
    }
    sets.push("\"updated_at\" = NOW()".to_string());
    let id_param = q.push_param(id.to_string());
    q.sql = format!(
        "UPDATE {} AS {a} SET {} WHERE {a}.\"id\" = ${}::uuid RETURNING to_jsonb({a})",
        target,
        sets.join(", "),
        id_param,
        a = ROW_ALIAS
    );
    Ok(q)
}

/// DELETE by id, returning the removed row.
pub fn delete(schema: &str, table: &str, id: &str) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, table)?;
    let n = q.push_param(id.to_string());
    q.sql = format!(
        "DELETE FROM {} AS {a} WHERE {a}.\"id\" = ${}::uuid RETURNING to_jsonb({a})",
        target,
        n,
        a = ROW_ALIAS
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Order;
    use serde_json::json;

    #[test]
    fn select_binds_filters_in_key_order() {
        let query = Query {
            filters: Filters::new().eq("status", "ativo").eq("escola_id", "e1"),
            order: Order::asc("nome"),
            limit: Some(5000),
            offset: Some(10),
        };
        let q = select_list("public", "educacao_alunos", &query).unwrap();
        assert_eq!(
            q.sql,
            "SELECT to_jsonb(t) FROM \"public\".\"educacao_alunos\" t \
             WHERE to_jsonb(t.\"escola_id\") = $1::jsonb AND to_jsonb(t.\"status\") = $2::jsonb \
             ORDER BY t.\"nome\" ASC LIMIT 1000 OFFSET 10"
        );
        assert_eq!(q.params, vec!["\"e1\"".to_string(), "\"ativo\"".to_string()]);
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let query = Query {
            order: Order::asc("nome; DROP TABLE x"),
            ..Query::default()
        };
        assert!(matches!(
            select_list("public", "t", &query),
            Err(StoreError::InvalidQuery(_))
        ));
        assert!(count("public", "bad\"name", &Filters::new()).is_err());
    }

    #[test]
    fn insert_lists_only_given_columns() {
        let row = json!({"nome": "Ana", "tenant_id": "t1"});
        let q = insert("public", "saude_pacientes", row.as_object().unwrap()).unwrap();
        assert!(q.sql.starts_with("INSERT INTO \"public\".\"saude_pacientes\" AS t (\"nome\", \"tenant_id\") SELECT \"nome\", \"tenant_id\""));
        assert!(q.sql.ends_with("RETURNING to_jsonb(t)"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn insert_leaves_timestamps_to_the_database() {
        let row = json!({"nome": "Ana", "created_at": "2001-01-01", "updated_at": "2001-01-01"});
        let q = insert("public", "saude_pacientes", row.as_object().unwrap()).unwrap();
        assert!(!q.sql.contains("created_at"));
        assert!(!q.params[0].contains("2001"));

        let only = json!({"created_at": "2001-01-01"});
        let q = insert("public", "saude_pacientes", only.as_object().unwrap()).unwrap();
        assert!(q.sql.contains("DEFAULT VALUES"));
    }

    #[test]
    fn update_skips_immutable_columns_and_binds_id_last() {
        let patch = json!({"id": "x", "created_at": "2020-01-01", "status": "concluido"});
        let q = update("public", "protocolos", "abc", patch.as_object().unwrap()).unwrap();
        assert!(q.sql.contains("(\"status\") = (SELECT \"status\""));
        assert!(q.sql.contains("\"updated_at\" = NOW()"));
        assert!(!q.sql.contains("\"created_at\""));
        assert_eq!(q.params.last().map(String::as_str), Some("abc"));
        assert!(q.sql.contains("WHERE t.\"id\" = $2::uuid"));
    }

    #[test]
    fn empty_patch_still_touches_updated_at() {
        let q = update("public", "protocolos", "abc", &Map::new()).unwrap();
        assert!(q.sql.contains("SET \"updated_at\" = NOW() WHERE t.\"id\" = $1::uuid"));
    }
}
