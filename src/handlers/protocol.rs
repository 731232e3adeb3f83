//! Protocol lifecycle endpoints.

use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::{success_many, success_one, success_one_ok};
use crate::services::protocol::NovoProtocolo;
use crate::services::ProtocolService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default)]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub observacao: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub responsavel_id: String,
    #[serde(default)]
    pub usuario_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RatingBody {
    pub nota: i32,
    #[serde(default)]
    pub cidadao_id: Option<String>,
    #[serde(default)]
    pub comentario: Option<String>,
}

fn service(state: &AppState, tenant: &str) -> ProtocolService {
    ProtocolService::new(&state.data, tenant)
}

/// POST /api/v1/protocolos
pub async fn create(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Json(body): Json<NovoProtocolo>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let p = service(&state, &tenant).create_protocol(&body).await?;
    Ok(success_one(p))
}

/// PATCH /api/v1/protocolos/:id/status
pub async fn update_status(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let p = service(&state, &tenant)
        .update_status(&id, &body.status, body.usuario_id.as_deref(), body.observacao.as_deref())
        .await?;
    Ok(success_one_ok(p))
}

/// PATCH /api/v1/protocolos/:id/responsavel
pub async fn assign(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let p = service(&state, &tenant)
        .assign(&id, &body.responsavel_id, body.usuario_id.as_deref())
        .await?;
    Ok(success_one_ok(p))
}

/// POST /api/v1/protocolos/:id/avaliacao
pub async fn rate(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RatingBody>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let a = service(&state, &tenant)
        .submit_rating(&id, body.cidadao_id.as_deref(), body.nota, body.comentario.as_deref())
        .await?;
    Ok(success_one(a))
}

/// GET /api/v1/protocolos/:id/historico
pub async fn history(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let rows = service(&state, &tenant).history(&id).await?;
    Ok(success_many(rows))
}

/// GET /api/v1/protocolos/categorias
pub async fn categories(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(success_many(service(&state, &tenant).list_categories().await?))
}

/// GET /api/v1/protocolos/categorias/:id/servicos
pub async fn services(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(categoria_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let rows = service(&state, &tenant).list_services(Some(&categoria_id)).await?;
    Ok(success_many(rows))
}
