//! Onboarding checklist endpoints.

use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::success_one_ok;
use crate::services::OnboardingService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

pub async fn progress(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(OnboardingService::new(&state.data, &tenant).progress().await?))
}

/// POST /api/v1/onboarding/:etapa with optional step data as body.
pub async fn complete(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(etapa): Path<String>,
    body: Option<Json<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let dados = body.map(|Json(v)| v).filter(|v| !v.is_null());
    let row = OnboardingService::new(&state.data, &tenant)
        .complete_step(&etapa, dados)
        .await?;
    Ok(success_one_ok(row))
}

pub async fn reset(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(etapa): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    OnboardingService::new(&state.data, &tenant).reset_step(&etapa).await?;
    Ok(StatusCode::NO_CONTENT)
}
