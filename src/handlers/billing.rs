//! Billing endpoints. The batch run spans every tenant and needs the service key.

use crate::error::AppError;
use crate::extractors::{ServiceKey, TenantId};
use crate::response::{success_one, success_one_ok};
use crate::services::BillingService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Default, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub data_referencia: Option<NaiveDate>,
}

#[derive(Default, Deserialize)]
pub struct BatchBody {
    #[serde(default)]
    pub hoje: Option<NaiveDate>,
}

#[derive(Default, Deserialize)]
pub struct PaymentBody {
    #[serde(default)]
    pub data_pagamento: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// POST /api/v1/faturamento/assinaturas/:id/faturas
pub async fn generate(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateBody>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let referencia = body.and_then(|Json(b)| b.data_referencia).unwrap_or_else(today);
    let fatura = BillingService::for_tenant(&state.data, &tenant)
        .generate_invoice(&id, referencia)
        .await?;
    Ok(success_one(fatura))
}

/// POST /api/v1/faturamento/lote
pub async fn batch(
    _key: ServiceKey,
    State(state): State<AppState>,
    body: Option<Json<BatchBody>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let hoje = body.and_then(|Json(b)| b.hoje).unwrap_or_else(today);
    let relatorio = BillingService::new(&state.data).generate_due_invoices(hoje).await?;
    Ok(success_one_ok(relatorio))
}

/// POST /api/v1/faturamento/faturas/:id/pagamento
pub async fn pay(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<PaymentBody>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let pago_em = body.and_then(|Json(b)| b.data_pagamento).unwrap_or_else(today);
    let fatura = BillingService::for_tenant(&state.data, &tenant)
        .mark_paid(&id, pago_em)
        .await?;
    Ok(success_one_ok(fatura))
}
