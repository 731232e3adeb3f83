//! Generic table handlers: list, stats, create, read, update, delete for any registry table.
//! Every call is scoped to the tenant named in `X-Tenant-ID`.

use crate::crud::EntityCrud;
use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::{success_one, success_one_ok, success_page};
use crate::schema::{table_def, TableDef};
use crate::sql::MAX_LIMIT;
use crate::state::AppState;
use crate::store::{Filters, Order};
use crate::validation::RequestValidator;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;

fn resolve(table: &str) -> Result<&'static TableDef, AppError> {
    table_def(table).ok_or_else(|| AppError::NotFound(format!("table {}", table)))
}

fn binding(state: &AppState, def: &TableDef, tenant: &str) -> EntityCrud<Value> {
    state.data.bind(def, tenant)
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(mut m) => {
            for k in ["id", "tenant_id", "created_at", "updated_at"] {
                m.remove(k);
            }
            Ok(m)
        }
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Query-string values arrive as text; type them after the column's SQL type.
fn query_value_for_column(def: &TableDef, col: &str, s: &str) -> Value {
    let pg_type = def
        .columns
        .iter()
        .find(|c| c.name == col)
        .map(|c| c.pg_type.to_ascii_uppercase())
        .unwrap_or_default();
    if pg_type.starts_with("INT") || pg_type.starts_with("BIGINT") || pg_type.starts_with("NUMERIC") {
        if let Ok(n) = s.parse::<i64>() {
            return Value::from(n);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::from(f);
        }
    }
    if pg_type.starts_with("BOOL") {
        if s.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
    }
    Value::String(s.to_string())
}

struct ListParams {
    filters: Filters,
    order: Option<Order>,
    limit: u32,
    offset: Option<u32>,
}

/// Split query params into paging, ordering and equality filters. Unknown columns are ignored.
fn parse_params(def: &TableDef, params: HashMap<String, String>) -> Result<ListParams, AppError> {
    let mut out = ListParams {
        filters: Filters::new(),
        order: None,
        limit: DEFAULT_LIMIT,
        offset: None,
    };
    for (k, v) in params {
        match k.as_str() {
            "limit" => {
                let n: u32 = v.parse().map_err(|_| AppError::BadRequest("invalid limit".into()))?;
                out.limit = n.clamp(1, MAX_LIMIT);
            }
            "offset" => {
                out.offset = Some(v.parse().map_err(|_| AppError::BadRequest("invalid offset".into()))?);
            }
            "order" => {
                let order = Order::parse(&v).ok_or_else(|| AppError::BadRequest(format!("invalid order {}", v)))?;
                if !def.has_column(&order.column) {
                    return Err(AppError::BadRequest(format!("unknown order column {}", order.column)));
                }
                out.order = Some(order);
            }
            _ => {
                if def.has_column(&k) && k != "tenant_id" {
                    let val = query_value_for_column(def, &k, &v);
                    out.filters.insert(k, val);
                }
            }
        }
    }
    Ok(out)
}

/// Row by id, treating rows of other tenants as absent.
async fn owned_row(crud: &EntityCrud<Value>, tenant: &str, id: &str) -> Result<Option<Value>, AppError> {
    let row = crud.get_one(id).await?;
    Ok(row.filter(|r| r.get("tenant_id").and_then(Value::as_str) == Some(tenant)))
}

pub async fn list(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let p = parse_params(def, params)?;
    let rows = binding(&state, def, &tenant)
        .list_page(&p.filters, p.order.as_ref(), Some(p.limit), p.offset)
        .await?;
    Ok(success_page(rows, Some(p.limit), p.offset))
}

pub async fn stats(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let p = parse_params(def, params)?;
    let count = binding(&state, def, &tenant).stats(&p.filters).await?;
    Ok(success_one_ok(json!({ "count": count })))
}

pub async fn create(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let body = body_to_map(body)?;
    RequestValidator::validate(&body, &def.validation())?;
    let row = binding(&state, def, &tenant).create(&body).await?;
    Ok(success_one(row))
}

pub async fn read(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let crud = binding(&state, def, &tenant);
    let row = owned_row(&crud, &tenant, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", table, id)))?;
    Ok(success_one_ok(row))
}

pub async fn update(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let body = body_to_map(body)?;
    RequestValidator::validate_partial(&body, &def.validation())?;
    let crud = binding(&state, def, &tenant);
    if owned_row(&crud, &tenant, &id).await?.is_none() {
        return Err(AppError::NotFound(format!("{} {}", table, id)));
    }
    let row = crud.update(&id, &body).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let def = resolve(&table)?;
    let crud = binding(&state, def, &tenant);
    if owned_row(&crud, &tenant, &id).await?.is_some() {
        crud.delete(&id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{educacao, saude};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn params_split_into_filters_order_and_paging() {
        let p = parse_params(
            &saude::PACIENTES,
            params(&[("status", "ativo"), ("order", "nome.desc"), ("limit", "5000"), ("bogus", "x")]),
        )
        .unwrap();
        assert_eq!(p.filters, Filters::new().eq("status", "ativo"));
        assert_eq!(p.order, Some(Order::desc("nome")));
        assert_eq!(p.limit, MAX_LIMIT);
        assert_eq!(p.offset, None);
    }

    #[test]
    fn tenant_filter_cannot_be_overridden() {
        let p = parse_params(&saude::PACIENTES, params(&[("tenant_id", "other")])).unwrap();
        assert!(p.filters.is_empty());
    }

    #[test]
    fn bad_order_or_paging_is_rejected() {
        assert!(parse_params(&saude::PACIENTES, params(&[("order", "senha.asc")])).is_err());
        assert!(parse_params(&saude::PACIENTES, params(&[("order", "nome.up")])).is_err());
        assert!(parse_params(&saude::PACIENTES, params(&[("offset", "-1")])).is_err());
    }

    #[test]
    fn query_values_follow_column_types() {
        assert_eq!(query_value_for_column(&educacao::ESCOLAS, "capacidade_alunos", "300"), json!(300));
        assert_eq!(query_value_for_column(&educacao::ESCOLAS, "nome", "300"), json!("300"));
    }

    #[test]
    fn envelope_fields_are_stripped_from_bodies() {
        let m = body_to_map(json!({"id": "x", "tenant_id": "t", "nome": "n"})).unwrap();
        assert_eq!(m.len(), 1);
        assert!(body_to_map(json!([1])).is_err());
    }
}
