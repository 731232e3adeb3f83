//! Session bootstrap and profile picture upload. Profiles outside the caller's tenant are not found.

use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::success_one_ok;
use crate::services::SessionService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};

/// GET /api/v1/sessao/:user_id
pub async fn bootstrap(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(SessionService::for_tenant(&state.data, &tenant).bootstrap(&user_id).await?))
}

/// PUT /api/v1/sessao/:user_id/avatar with the raw image as body.
pub async fn upload_avatar(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let perfil = SessionService::for_tenant(&state.data, &tenant)
        .upload_avatar(state.storage.as_ref(), &user_id, body.to_vec(), content_type)
        .await?;
    Ok(success_one_ok(perfil))
}
