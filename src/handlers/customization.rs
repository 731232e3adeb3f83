//! Tenant customization endpoints, including the rendered theme stylesheet.

use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::success_one_ok;
use crate::services::tenant::stylesheet;
use crate::services::TenantService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// GET /api/v1/customizacao
pub async fn get(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(TenantService::new(&state.data, &tenant).get().await?))
}

/// PUT /api/v1/customizacao
pub async fn save(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let cfg = TenantService::new(&state.data, &tenant).save(&body).await?;
    Ok(success_one_ok(cfg))
}

/// GET /api/v1/customizacao/tema.css
pub async fn theme_css(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let cfg = TenantService::new(&state.data, &tenant).get().await?;
    Ok(([(header::CONTENT_TYPE, "text/css; charset=utf-8")], stylesheet(&cfg)))
}

/// PUT /api/v1/customizacao/logo with the raw image as body.
pub async fn upload_logo(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let cfg = TenantService::new(&state.data, &tenant)
        .upload_logo(state.storage.as_ref(), body.to_vec(), content_type)
        .await?;
    Ok(success_one_ok(cfg))
}
